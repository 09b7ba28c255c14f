//! Buy/Sell Conversation State Machine
//!
//! Pure transitions: given the current state and one inbound message, decide
//! the next state and what to tell the user. The engine owns storage and I/O.
//!
//! ```text
//! SELECTING_ACTION ──/buy──▶ BUY_STARS_AMOUNT ──n>0──▶ GET_PAYMENT_METHOD ──text──▶ confirm(buy)
//!        │
//!        └────────/sell─▶ SELL_STARS_AMOUNT ──n>0──▶ SELL_GET_PAYOUT_METHOD ──text──▶
//!                          GET_WALLET_ADDRESS ──text──▶ confirm(sell)
//! ```
//!
//! `/start` restarts from any state; `/cancel` and `/help` end the session.

use crate::fulfillment::{FulfillmentRequest, StarsAmount};

use super::messages;
use super::telegram::User;

/// Where a user is in the flow. Buy and sell carry only their own fields, so
/// a session can never hold both a payment and a payout method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    SelectingAction,
    Buy(BuyFlow),
    Sell(SellFlow),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyFlow {
    AwaitingAmount,
    AwaitingPaymentMethod { stars_amount: StarsAmount },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellFlow {
    AwaitingAmount,
    AwaitingPayoutMethod {
        stars_amount: StarsAmount,
    },
    AwaitingWalletAddress {
        stars_amount: StarsAmount,
        payout_method: String,
    },
}

impl ConversationState {
    /// Stable state name used in logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SelectingAction => "SELECTING_ACTION",
            Self::Buy(BuyFlow::AwaitingAmount) => "BUY_STARS_AMOUNT",
            Self::Buy(BuyFlow::AwaitingPaymentMethod { .. }) => "GET_PAYMENT_METHOD",
            Self::Sell(SellFlow::AwaitingAmount) => "SELL_STARS_AMOUNT",
            Self::Sell(SellFlow::AwaitingPayoutMethod { .. }) => "SELL_GET_PAYOUT_METHOD",
            Self::Sell(SellFlow::AwaitingWalletAddress { .. }) => "GET_WALLET_ADDRESS",
        }
    }

    /// Amount collected so far, if any.
    pub const fn stars_amount(&self) -> Option<StarsAmount> {
        match self {
            Self::Buy(BuyFlow::AwaitingPaymentMethod { stars_amount })
            | Self::Sell(
                SellFlow::AwaitingPayoutMethod { stars_amount }
                | SellFlow::AwaitingWalletAddress { stars_amount, .. },
            ) => Some(*stars_amount),
            _ => None,
        }
    }
}

/// A completed flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Buy {
        stars_amount: StarsAmount,
        payment_method: String,
        recipient: String,
    },
    Sell {
        stars_amount: StarsAmount,
        payout_method: String,
        wallet_address: String,
    },
}

impl Confirmation {
    /// Delivery request for the buy path; sells never call the automation.
    pub fn fulfillment_request(&self) -> Option<FulfillmentRequest> {
        match self {
            Self::Buy {
                stars_amount,
                recipient,
                ..
            } => Some(FulfillmentRequest {
                stars_amount: *stars_amount,
                recipient: recipient.clone(),
            }),
            Self::Sell { .. } => None,
        }
    }

    /// Text acknowledging the confirmation to the user.
    pub fn reply(&self) -> String {
        match self {
            Self::Buy {
                stars_amount,
                payment_method,
                recipient,
            } => messages::buy_confirmation(*stars_amount, payment_method, recipient),
            Self::Sell {
                stars_amount,
                payout_method,
                wallet_address,
            } => messages::sell_confirmation(*stars_amount, payout_method, wallet_address),
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Input not handled by the current state; say nothing.
    None,
    Reply(String),
    Confirm(Confirmation),
}

/// Result of feeding one message to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// `None` means the session ends.
    pub next: Option<ConversationState>,
    pub effect: Effect,
}

impl Step {
    fn to(next: ConversationState, reply: impl Into<String>) -> Self {
        Self {
            next: Some(next),
            effect: Effect::Reply(reply.into()),
        }
    }

    fn stay(current: &ConversationState) -> Self {
        Self {
            next: Some(current.clone()),
            effect: Effect::None,
        }
    }

    fn reprompt(current: &ConversationState, reply: impl Into<String>) -> Self {
        Self::to(current.clone(), reply)
    }

    fn end(effect: Effect) -> Self {
        Self { next: None, effect }
    }
}

/// One inbound chat message.
#[derive(Debug, Clone, Copy)]
pub struct Input<'a> {
    pub text: &'a str,
    pub sender: &'a User,
}

/// Bot commands the flow reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Buy,
    Sell,
    Help,
    Cancel,
    Other(&'a str),
}

impl<'a> Command<'a> {
    /// Parse `/name`, `/name@BotName` or `/name args`. `None` for plain text.
    pub fn parse(text: &'a str) -> Option<Self> {
        let token = text.trim_start().strip_prefix('/')?.split_whitespace().next()?;
        let name = token.split('@').next().unwrap_or(token);
        Some(match name.to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "buy" => Self::Buy,
            "sell" => Self::Sell,
            "help" => Self::Help,
            "cancel" => Self::Cancel,
            _ => Self::Other(name),
        })
    }
}

/// Advance a conversation by one message.
pub fn step(current: Option<&ConversationState>, input: Input<'_>) -> Step {
    let command = Command::parse(input.text);

    match command {
        Some(Command::Start) => {
            return Step::to(
                ConversationState::SelectingAction,
                messages::welcome(input.sender),
            )
        }
        Some(Command::Cancel | Command::Help) => {
            return Step::end(Effect::Reply(messages::HELP.to_string()))
        }
        _ => {}
    }

    let Some(state) = current else {
        // No conversation in progress: only /start opens one.
        return Step::end(Effect::None);
    };

    if let ConversationState::SelectingAction = state {
        return match command {
            Some(Command::Buy) => Step::to(
                ConversationState::Buy(BuyFlow::AwaitingAmount),
                messages::ASK_BUY_AMOUNT,
            ),
            Some(Command::Sell) => Step::to(
                ConversationState::Sell(SellFlow::AwaitingAmount),
                messages::ASK_SELL_AMOUNT,
            ),
            _ => Step::stay(state),
        };
    }

    // Data-entry states only take free text.
    if command.is_some() {
        return Step::stay(state);
    }

    match state {
        ConversationState::SelectingAction => Step::stay(state),
        ConversationState::Buy(flow) => step_buy(state, flow, input),
        ConversationState::Sell(flow) => step_sell(state, flow, input),
    }
}

fn step_buy(state: &ConversationState, flow: &BuyFlow, input: Input<'_>) -> Step {
    match flow {
        BuyFlow::AwaitingAmount => match StarsAmount::parse(input.text) {
            Ok(stars_amount) => Step::to(
                ConversationState::Buy(BuyFlow::AwaitingPaymentMethod { stars_amount }),
                messages::ask_payment_method(stars_amount),
            ),
            Err(e) => Step::reprompt(state, messages::invalid_amount(e)),
        },
        BuyFlow::AwaitingPaymentMethod { stars_amount } => {
            Step::end(Effect::Confirm(Confirmation::Buy {
                stars_amount: *stars_amount,
                payment_method: input.text.to_string(),
                recipient: input.sender.recipient_identity(),
            }))
        }
    }
}

fn step_sell(state: &ConversationState, flow: &SellFlow, input: Input<'_>) -> Step {
    match flow {
        SellFlow::AwaitingAmount => match StarsAmount::parse(input.text) {
            Ok(stars_amount) => Step::to(
                ConversationState::Sell(SellFlow::AwaitingPayoutMethod { stars_amount }),
                messages::ask_payout_method(stars_amount),
            ),
            Err(e) => Step::reprompt(state, messages::invalid_amount(e)),
        },
        SellFlow::AwaitingPayoutMethod { stars_amount } => Step::to(
            ConversationState::Sell(SellFlow::AwaitingWalletAddress {
                stars_amount: *stars_amount,
                payout_method: input.text.to_string(),
            }),
            messages::ASK_WALLET_ADDRESS,
        ),
        SellFlow::AwaitingWalletAddress {
            stars_amount,
            payout_method,
        } => Step::end(Effect::Confirm(Confirmation::Sell {
            stars_amount: *stars_amount,
            payout_method: payout_method.clone(),
            wallet_address: input.text.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::AmountError;

    fn user() -> User {
        User {
            id: 1001,
            is_bot: false,
            first_name: "Ann".into(),
            last_name: None,
            username: Some("ann".into()),
        }
    }

    /// Feed messages in order, returning the final state and every effect.
    fn run(inputs: &[&str]) -> (Option<ConversationState>, Vec<Effect>) {
        let sender = user();
        let mut state = None;
        let mut effects = Vec::new();
        for &text in inputs {
            let step = step(state.as_ref(), Input { text, sender: &sender });
            state = step.next;
            effects.push(step.effect);
        }
        (state, effects)
    }

    fn amount(n: u64) -> StarsAmount {
        StarsAmount::new(n).unwrap()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/BUY"), Some(Command::Buy));
        assert_eq!(Command::parse("/sell@StarsTraderBot"), Some(Command::Sell));
        assert_eq!(Command::parse("  /help me"), Some(Command::Help));
        assert_eq!(Command::parse("/foo"), Some(Command::Other("foo")));
        assert_eq!(Command::parse("buy"), None);
        assert_eq!(Command::parse("/"), None);
    }

    #[test]
    fn start_enters_selecting_action() {
        let (state, effects) = run(&["/start"]);
        assert_eq!(state, Some(ConversationState::SelectingAction));
        assert!(matches!(&effects[0], Effect::Reply(text) if text.contains("Welcome")));
    }

    #[test]
    fn without_session_only_start_is_handled() {
        let (state, effects) = run(&["hello", "/buy", "150"]);
        assert_eq!(state, None);
        assert!(effects.iter().all(|e| *e == Effect::None));
    }

    #[test]
    fn selecting_action_ignores_unrecognized_input() {
        let (state, effects) = run(&["/start", "buy please", "/unknown"]);
        assert_eq!(state, Some(ConversationState::SelectingAction));
        assert_eq!(effects[1..], [Effect::None, Effect::None]);
    }

    #[test]
    fn help_at_selecting_action_ends_session() {
        let (state, effects) = run(&["/start", "/help"]);
        assert_eq!(state, None);
        assert_eq!(effects[1], Effect::Reply(messages::HELP.to_string()));
    }

    #[test]
    fn non_numeric_amount_reprompts_without_storing() {
        for input in ["abc", "12.5", "", "one hundred"] {
            let (state, effects) = run(&["/start", "/buy", input]);
            assert_eq!(
                state,
                Some(ConversationState::Buy(BuyFlow::AwaitingAmount)),
                "input {input:?}"
            );
            assert_eq!(state.unwrap().stars_amount(), None);
            assert_eq!(
                effects[2],
                Effect::Reply(messages::invalid_amount(AmountError::NotANumber))
            );
        }
    }

    #[test]
    fn non_positive_amount_reprompts() {
        for input in ["0", "-1", "-9999"] {
            let (state, effects) = run(&["/start", "/sell", input]);
            assert_eq!(state, Some(ConversationState::Sell(SellFlow::AwaitingAmount)));
            assert_eq!(
                effects[2],
                Effect::Reply(messages::invalid_amount(AmountError::NotPositive))
            );
        }
    }

    #[test]
    fn oversized_amount_reprompts_with_limit() {
        let (state, effects) = run(&["/start", "/buy", "18446744073709551616"]);
        assert_eq!(state, Some(ConversationState::Buy(BuyFlow::AwaitingAmount)));
        assert_eq!(
            effects[2],
            Effect::Reply(messages::invalid_amount(AmountError::TooLarge))
        );
    }

    #[test]
    fn positive_amount_is_stored_and_advances() {
        for n in [1u64, 50, 150, 1_000_000] {
            let text = n.to_string();
            let (state, _) = run(&["/start", "/buy", "oops", "0", text.as_str()]);
            assert_eq!(
                state,
                Some(ConversationState::Buy(BuyFlow::AwaitingPaymentMethod {
                    stars_amount: amount(n)
                }))
            );
        }
    }

    #[test]
    fn buy_path_confirms_with_recipient() {
        let (state, effects) = run(&["/start", "/buy", "150", "USDT"]);
        assert_eq!(state, None);

        let confirmation = Confirmation::Buy {
            stars_amount: amount(150),
            payment_method: "USDT".into(),
            recipient: "@ann".into(),
        };
        assert_eq!(effects[3], Effect::Confirm(confirmation.clone()));
        assert_eq!(
            confirmation.fulfillment_request(),
            Some(FulfillmentRequest {
                stars_amount: amount(150),
                recipient: "@ann".into(),
            })
        );
    }

    #[test]
    fn sell_path_collects_wallet_and_never_fulfills() {
        let (state, effects) = run(&["/start", "/sell", "50", "Bank Transfer", "0xABC"]);
        assert_eq!(state, None);

        let Effect::Confirm(confirmation) = &effects[4] else {
            panic!("expected confirmation, got {:?}", effects[4]);
        };
        assert_eq!(
            *confirmation,
            Confirmation::Sell {
                stars_amount: amount(50),
                payout_method: "Bank Transfer".into(),
                wallet_address: "0xABC".into(),
            }
        );
        assert!(confirmation.fulfillment_request().is_none());
        assert!(confirmation.reply().contains("send the Stars first"));
    }

    #[test]
    fn method_is_stored_verbatim() {
        let (state, _) = run(&["/start", "/sell", "5", "  PayPal <eu>  "]);
        assert_eq!(
            state,
            Some(ConversationState::Sell(SellFlow::AwaitingWalletAddress {
                stars_amount: amount(5),
                payout_method: "  PayPal <eu>  ".into(),
            }))
        );
    }

    #[test]
    fn commands_are_ignored_in_data_entry_states() {
        let (state, effects) = run(&["/start", "/buy", "10", "/sell"]);
        assert_eq!(
            state,
            Some(ConversationState::Buy(BuyFlow::AwaitingPaymentMethod {
                stars_amount: amount(10)
            }))
        );
        assert_eq!(effects[3], Effect::None);
    }

    #[test]
    fn cancel_ends_session_from_any_state() {
        for prefix in [
            &["/start"][..],
            &["/start", "/buy"],
            &["/start", "/buy", "5"],
            &["/start", "/sell", "5", "USDT"],
        ] {
            let mut inputs = prefix.to_vec();
            inputs.push("/cancel");
            let (state, effects) = run(&inputs);
            assert_eq!(state, None);
            assert_eq!(
                effects.last(),
                Some(&Effect::Reply(messages::HELP.to_string()))
            );
        }
    }

    #[test]
    fn start_restarts_mid_flow() {
        let (state, _) = run(&["/start", "/sell", "5", "/start"]);
        assert_eq!(state, Some(ConversationState::SelectingAction));
    }

    #[test]
    fn state_names() {
        assert_eq!(ConversationState::SelectingAction.name(), "SELECTING_ACTION");
        assert_eq!(
            ConversationState::Sell(SellFlow::AwaitingWalletAddress {
                stars_amount: amount(1),
                payout_method: String::new(),
            })
            .name(),
            "GET_WALLET_ADDRESS"
        );
    }
}
