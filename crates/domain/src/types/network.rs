//! External messaging networks

use serde::{Deserialize, Serialize};

/// A third-party messaging integration with its own API namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// WhatsApp-style network (admin namespace, numeric user keys)
    #[serde(rename = "WHATSAPP", alias = "whatsapp", alias = "WHATSAPPGROUPS")]
    WhatsApp,
    /// WeChat-style network (gateway namespace, email user keys)
    #[serde(rename = "WECHAT", alias = "wechat")]
    WeChat,
}

impl Network {
    /// All supported networks, in declaration order.
    pub const ALL: [Self; 2] = [Self::WhatsApp, Self::WeChat];
}

crate::impl_token_conversions!(Network {
    WhatsApp => "whatsapp" | "whatsappgroups",
    WeChat => "wechat",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_tokens() {
        assert_eq!("WHATSAPP".parse::<Network>().unwrap(), Network::WhatsApp);
        assert_eq!("WhatsAppGroups".parse::<Network>().unwrap(), Network::WhatsApp);
        assert_eq!("wechat".parse::<Network>().unwrap(), Network::WeChat);
        assert!("telegram".parse::<Network>().is_err());
    }

    #[test]
    fn serde_uses_uppercase_names() {
        assert_eq!(serde_json::to_string(&Network::WeChat).unwrap(), "\"WECHAT\"");
        let parsed: Network = serde_json::from_str("\"WHATSAPPGROUPS\"").unwrap();
        assert_eq!(parsed, Network::WhatsApp);
    }
}
