//! User-facing message texts (Telegram HTML parse mode).

use crate::fulfillment::{AmountError, StarsAmount};

use super::telegram::User;

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn mention(user: &User) -> String {
    format!(
        r#"<a href="tg://user?id={}">{}</a>"#,
        user.id,
        escape_html(&user.full_name())
    )
}

pub fn welcome(user: &User) -> String {
    format!(
        "Hi {}! Welcome to the Stars Trader Bot. 🤖\n\n\
         I can help you buy and sell stars. What would you like to do?\n\n\
         /buy - Buy Stars\n\
         /sell - Sell Stars\n\
         /help - How this works",
        mention(user)
    )
}

pub const HELP: &str = "Stars Trader Bot\n\n\
    /start - Begin a new trade\n\
    /buy - Buy Stars (after /start)\n\
    /sell - Sell Stars (after /start)\n\
    /cancel - Abandon the current trade\n\n\
    Send /start whenever you are ready.";

pub const ASK_BUY_AMOUNT: &str = "How many Stars would you like to buy? Please send a whole number.";

pub const ASK_SELL_AMOUNT: &str =
    "How many Stars would you like to sell? Please send a whole number.";

pub fn invalid_amount(error: AmountError) -> String {
    match error {
        AmountError::NotANumber => {
            "That doesn't look like a number. Please send the amount of Stars as a whole number, e.g. 150."
                .to_string()
        }
        AmountError::NotPositive => {
            "The amount must be greater than zero. Please send a positive number of Stars."
                .to_string()
        }
        AmountError::TooLarge => format!(
            "That amount is too large. Please send a whole number no bigger than {}.",
            u64::MAX
        ),
    }
}

pub fn ask_payment_method(amount: StarsAmount) -> String {
    format!(
        "You want to buy <b>{amount}</b> Stars.\n\n\
         Which payment method will you use? (e.g. USDT, TON, BTC)"
    )
}

pub fn ask_payout_method(amount: StarsAmount) -> String {
    format!(
        "You want to sell <b>{amount}</b> Stars.\n\n\
         How would you like to be paid? (e.g. USDT, Bank Transfer)"
    )
}

pub const ASK_WALLET_ADDRESS: &str =
    "Please send the wallet address or account details for your payout.";

pub fn buy_confirmation(amount: StarsAmount, payment_method: &str, recipient: &str) -> String {
    format!(
        "Order confirmed: <b>{amount}</b> Stars for {} paid with {}.\n\n\
         Delivering your Stars now. This can take up to a minute...",
        escape_html(recipient),
        escape_html(payment_method)
    )
}

pub fn fulfillment_succeeded(amount: StarsAmount, recipient: &str) -> String {
    format!(
        "✅ <b>{amount}</b> Stars have been sent to {}. Thank you for trading!",
        escape_html(recipient)
    )
}

pub fn fulfillment_failed(amount: StarsAmount) -> String {
    format!(
        "❌ We could not deliver your <b>{amount}</b> Stars. \
         Please contact support, or try again later with /start."
    )
}

pub fn sell_confirmation(amount: StarsAmount, payout_method: &str, wallet_address: &str) -> String {
    format!(
        "Sell request received for <b>{amount}</b> Stars.\n\
         Payout method: {}\n\
         Payout address: <code>{}</code>\n\n\
         Please send the Stars first. Your payout is processed once they arrive.",
        escape_html(payout_method),
        escape_html(wallet_address)
    )
}

pub const RESTART_NEEDED: &str =
    "Something went wrong with your request. Please start again with /start.";
