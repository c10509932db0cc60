//! Fixed bot replies. Markdown, sent verbatim.

pub const HELP_MSG: &str = "Supported commands:\n\n\
/start - Log in to your shop\n\
/pin - Submit the login PIN\n\
/help - Show this message";

pub const START_MSG: &str = "*Welcome!*\n\n\
This bot watches your shop listings and pings you when one sells out.\n\
Before notifications can start you need to log in. The app requests \
read-only access to your shop and listings, and stores only what the \
notifications need: your marketplace user id and an access token.\n\n\
After you authorize the app you will receive a one-time PIN code. \
Submit it here as:\n\
`/pin {pin code}`\n\n\
Example:\n\
`/pin 76279961`\n\n\
Type /help for the list of commands.";

pub const SUCCESS_MSG: &str = "Success!\nYou will be notified when products are sold out.";

pub const EMPTY_PIN_MSG: &str =
    "The PIN looks empty. Please send it as: /pin {pin code}";

/// Low-stock notification body for a sold-out listing.
pub fn low_stock(skus: &[String], shop_name: &str) -> String {
    format!("Low stock for SKU: [{}], shop: {}", skus.join(", "), shop_name)
}
