use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;

/// Rewrites a sender number from an inbound webhook into a number the
/// send API accepts as a recipient.
pub trait RecipientNormalizer: Send + Sync {
    fn normalize<'a>(&self, phone_number: &'a str) -> Cow<'a, str>;
}

/// Argentinian mobile numbers arrive as `54 9 XXXXXXXXXX` but must be
/// addressed without the mobile `9`, eg: "5491112345678" -> "541112345678".
/// Anything that isn't exactly that 13 digit shape is returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgentinaMobile;
impl RecipientNormalizer for ArgentinaMobile {
    fn normalize<'a>(&self, phone_number: &'a str) -> Cow<'a, str> {
        let bytes = phone_number.as_bytes();
        if bytes.len() == 13 && bytes.starts_with(b"54") && bytes[2] == b'9' {
            // Slicing is safe, the first three bytes are ASCII.
            Cow::Owned(format!("{}{}", &phone_number[..2], &phone_number[3..]))
        } else {
            Cow::Borrowed(phone_number)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;
impl RecipientNormalizer for Passthrough {
    fn normalize<'a>(&self, phone_number: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(phone_number)
    }
}

/// Numbering plan selected in config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingPlan {
    #[default]
    ArgentinaMobile,
    None,
}
impl NumberingPlan {
    pub fn normalizer(self) -> Arc<dyn RecipientNormalizer> {
        match self {
            NumberingPlan::ArgentinaMobile => Arc::new(ArgentinaMobile),
            NumberingPlan::None => Arc::new(Passthrough),
        }
    }
}
