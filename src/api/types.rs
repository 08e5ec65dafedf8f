use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The monitored trading venues, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Upbit,
    Bithumb,
}

impl Exchange {
    pub const ALL: [Exchange; 2] = [Exchange::Upbit, Exchange::Bithumb];

    pub fn name(&self) -> &'static str {
        match self {
            Exchange::Upbit => "Upbit",
            Exchange::Bithumb => "Bithumb",
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Exchange::Upbit => "[UPBIT]",
            Exchange::Bithumb => "[BITHUMB]",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One notice from an exchange announcement board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpbitNoticeResponse {
    #[serde(default)]
    pub data: UpbitNoticePage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpbitNoticePage {
    #[serde(default)]
    pub list: Vec<UpbitNotice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpbitNotice {
    // Numeric on the wire today, but tolerate strings.
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub title: String,
}

impl UpbitNotice {
    pub fn into_announcement(self) -> Option<Announcement> {
        let id = match self.id {
            Value::Number(n) => n.to_string(),
            Value::String(s) if !s.is_empty() => s,
            _ => return None,
        };
        Some(Announcement {
            id,
            title: self.title,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpbitMarket {
    pub market: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BithumbTickerResponse {
    pub status: String,
    #[serde(default)]
    pub data: Value,
}
