//! Spending-category classification for extracted transactions.
//!
//! [`MerchantClassifier`] answers from its per-merchant cache, then from a
//! static known-merchant table, then from an optional remote model. Any
//! error is recovered by the engine to `UNCATEGORIZED`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::models::category::Category;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("no category known for merchant {0:?}")]
    Unknown(String),

    #[error("classifier request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("classifier returned an unusable reply: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, merchant: Option<&str>, sms: &str) -> Result<Category, ClassifierError>;
}

const KNOWN_MERCHANTS: &[(&str, Category)] = &[
    ("ZOMATO", Category::Food),
    ("SWIGGY", Category::Food),
    ("DOMINOS", Category::Food),
    ("PIZZA HUT", Category::Food),
    ("MCDONALDS", Category::Food),
    ("MCDONALD", Category::Food),
    ("KFC", Category::Food),
    ("BURGER KING", Category::Food),
    ("SUBWAY", Category::Food),
    ("STARBUCKS", Category::Food),
    ("DUNZO", Category::Food),
    ("BLINKIT", Category::Food),
    ("ZEPTO", Category::Food),
    ("INSTAMART", Category::Food),
    ("BIGBASKET", Category::Food),
    ("GROFERS", Category::Food),
    ("DMART", Category::Food),
    ("RELIANCE FRESH", Category::Food),
    ("AMAZON", Category::Shopping),
    ("AMAZON PAY", Category::Shopping),
    ("FLIPKART", Category::Shopping),
    ("MYNTRA", Category::Shopping),
    ("AJIO", Category::Shopping),
    ("NYKAA", Category::Shopping),
    ("MEESHO", Category::Shopping),
    ("SNAPDEAL", Category::Shopping),
    ("CROMA", Category::Shopping),
    ("RELIANCE DIGITAL", Category::Shopping),
    ("DECATHLON", Category::Shopping),
    ("UBER", Category::Transport),
    ("OLA", Category::Transport),
    ("OLA CABS", Category::Transport),
    ("RAPIDO", Category::Transport),
    ("IRCTC", Category::Transport),
    ("MAKEMYTRIP", Category::Transport),
    ("GOIBIBO", Category::Transport),
    ("REDBUS", Category::Transport),
    ("YATRA", Category::Transport),
    ("CLEARTRIP", Category::Transport),
    ("INDIAN OIL", Category::Transport),
    ("HP PETROL", Category::Transport),
    ("BHARAT PETROLEUM", Category::Transport),
    ("FASTAG", Category::Transport),
    ("METRO", Category::Transport),
    ("DMRC", Category::Transport),
    ("NETFLIX", Category::Entertainment),
    ("HOTSTAR", Category::Entertainment),
    ("DISNEY HOTSTAR", Category::Entertainment),
    ("PRIME VIDEO", Category::Entertainment),
    ("SPOTIFY", Category::Entertainment),
    ("YOUTUBE", Category::Entertainment),
    ("GAANA", Category::Entertainment),
    ("JIOSAAVN", Category::Entertainment),
    ("BOOKMYSHOW", Category::Entertainment),
    ("PVR", Category::Entertainment),
    ("INOX", Category::Entertainment),
    ("SONY LIV", Category::Entertainment),
    ("ZEE5", Category::Entertainment),
    ("AIRTEL", Category::Utilities),
    ("JIO", Category::Utilities),
    ("VODAFONE", Category::Utilities),
    ("VI", Category::Utilities),
    ("BSNL", Category::Utilities),
    ("TATA POWER", Category::Utilities),
    ("ADANI GAS", Category::Utilities),
    ("MAHANAGAR GAS", Category::Utilities),
    ("BESCOM", Category::Utilities),
    ("MSEDCL", Category::Utilities),
    ("ACT FIBERNET", Category::Utilities),
    ("HATHWAY", Category::Utilities),
    ("LIC", Category::Utilities),
    ("HDFC LIFE", Category::Utilities),
    ("ICICI PRUDENTIAL", Category::Utilities),
];

/// Uppercase, drop `UPI-`/`BBPS-` prefixes, collapse whitespace.
pub fn normalize_merchant(merchant: Option<&str>) -> String {
    let Some(raw) = merchant.map(str::trim).filter(|m| !m.is_empty()) else {
        return UNKNOWN_MERCHANT.to_string();
    };
    let upper = raw.to_uppercase();
    let stripped = upper
        .strip_prefix("UPI-")
        .or_else(|| upper.strip_prefix("BBPS-"))
        .unwrap_or(&upper);
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cache key of every SMS without a captured merchant.
const UNKNOWN_MERCHANT: &str = "UNKNOWN";

/// Exact match first, then the longest table entry found as whole words.
pub fn known_merchant(normalized: &str) -> Option<Category> {
    if let Some((_, category)) = KNOWN_MERCHANTS.iter().find(|(name, _)| *name == normalized) {
        return Some(*category);
    }
    let padded = format!(" {normalized} ");
    KNOWN_MERCHANTS
        .iter()
        .filter(|(name, _)| padded.contains(&format!(" {name} ")))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, category)| *category)
}

/// Client for a `generateContent`-style text model endpoint.
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpClassifier {
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
        })
    }

    fn prompt(merchant: Option<&str>, sms: &str) -> String {
        let context: String = sms.chars().take(200).collect();
        format!(
            "You are a transaction categorizer. Categorize this transaction into exactly ONE of these categories:\n\
             - FOOD (restaurants, food delivery, groceries, cafes, bakeries)\n\
             - SHOPPING (retail stores, online shopping, e-commerce)\n\
             - ENTERTAINMENT (movies, streaming, gaming, events, subscriptions)\n\
             - TRANSPORT (cab, metro, bus, fuel, parking, flights, trains)\n\
             - UTILITIES (electricity, water, gas, internet, phone bills, insurance)\n\
             - OTHERS (anything that doesn't fit above)\n\n\
             Merchant: {}\nSMS Context: {}\n\n\
             Reply with ONLY the category name in uppercase. Nothing else.",
            merchant.unwrap_or("Unknown"),
            context
        )
    }

    /// Pull the first candidate's text out of the reply and map it to a category.
    fn parse_reply(body: &Value) -> Result<Category, ClassifierError> {
        let text = body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| ClassifierError::InvalidResponse("missing candidate text".into()))?;
        Ok(Category::from_label(text)
            .filter(|c| *c != Category::Uncategorized)
            .unwrap_or(Category::Others))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, merchant: Option<&str>, sms: &str) -> Result<Category, ClassifierError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": Self::prompt(merchant, sms) }] }],
            "generationConfig": { "temperature": 0.1, "maxOutputTokens": 20 }
        });

        let reply: Value = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Self::parse_reply(&reply)
    }
}

/// Cache, then known merchants, then the remote model if configured.
pub struct MerchantClassifier {
    remote: Option<Arc<dyn Classifier>>,
    cache: DashMap<String, Category>,
}

impl MerchantClassifier {
    pub fn new(remote: Option<Arc<dyn Classifier>>) -> Self {
        Self {
            remote,
            cache: DashMap::new(),
        }
    }

    /// Known-merchant table only.
    pub fn offline() -> Self {
        Self::new(None)
    }

    /// Build from configuration; the remote model is used only when enabled
    /// with both a URL and a key.
    pub fn from_config(config: &AppConfig) -> Result<Self, ClassifierError> {
        let remote = match (
            config.classifier_enabled,
            &config.classifier_api_url,
            &config.classifier_api_key,
        ) {
            (true, Some(url), Some(key)) => {
                let http = HttpClassifier::new(
                    url.clone(),
                    key.clone(),
                    Duration::from_secs(config.classifier_timeout_secs),
                )?;
                Some(Arc::new(http) as Arc<dyn Classifier>)
            }
            (true, _, _) => {
                tracing::warn!("Classifier enabled but CLASSIFIER_API_URL or CLASSIFIER_API_KEY is missing");
                None
            }
            _ => None,
        };
        Ok(Self::new(remote))
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl Classifier for MerchantClassifier {
    async fn classify(&self, merchant: Option<&str>, sms: &str) -> Result<Category, ClassifierError> {
        let normalized = normalize_merchant(merchant);
        // Without a merchant the answer depends on the SMS text, so nothing is cached.
        let cacheable = normalized != UNKNOWN_MERCHANT;
        if cacheable {
            if let Some(hit) = self.cache.get(&normalized) {
                return Ok(*hit.value());
            }
            if let Some(category) = known_merchant(&normalized) {
                self.cache.insert(normalized, category);
                return Ok(category);
            }
        }

        let Some(remote) = &self.remote else {
            return Err(ClassifierError::Unknown(normalized));
        };
        let category = remote.classify(merchant, sms).await?;
        tracing::debug!(merchant = %normalized, ?category, "Merchant classified remotely");
        if cacheable {
            self.cache.insert(normalized, category);
        }
        Ok(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Classifier for Counting {
        async fn classify(&self, _: Option<&str>, _: &str) -> Result<Category, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Category::Shopping)
        }
    }

    #[test]
    fn normalizes_prefixes_and_spacing() {
        assert_eq!(normalize_merchant(Some("upi-Swiggy   Ltd")), "SWIGGY LTD");
        assert_eq!(normalize_merchant(Some("BBPS-Tata Power")), "TATA POWER");
        assert_eq!(normalize_merchant(None), "UNKNOWN");
        assert_eq!(normalize_merchant(Some("  ")), "UNKNOWN");
    }

    #[test]
    fn known_merchant_exact_and_partial() {
        assert_eq!(known_merchant("ZOMATO"), Some(Category::Food));
        assert_eq!(known_merchant("UBER INDIA SYSTEMS"), Some(Category::Transport));
        assert_eq!(known_merchant("AMAZON PAY INDIA"), Some(Category::Shopping));
        assert_eq!(known_merchant("MOVIE HALL"), None);
        assert_eq!(known_merchant("UNKNOWN"), None);
    }

    #[test]
    fn parses_model_reply() {
        let body = json!({"candidates":[{"content":{"parts":[{"text":" Food.\n"}]}}]});
        assert_eq!(HttpClassifier::parse_reply(&body).unwrap(), Category::Food);

        let odd = json!({"candidates":[{"content":{"parts":[{"text":"GROCERIES"}]}}]});
        assert_eq!(HttpClassifier::parse_reply(&odd).unwrap(), Category::Others);

        assert!(HttpClassifier::parse_reply(&json!({})).is_err());
    }

    #[tokio::test]
    async fn offline_unknown_merchant_is_error() {
        let classifier = MerchantClassifier::offline();
        assert!(classifier.classify(Some("Corner Shop"), "sms").await.is_err());
        assert_eq!(
            classifier.classify(Some("UPI-NETFLIX"), "sms").await.unwrap(),
            Category::Entertainment
        );
    }

    #[tokio::test]
    async fn remote_results_are_cached_per_merchant() {
        let remote = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let classifier = MerchantClassifier::new(Some(remote.clone() as Arc<dyn Classifier>));

        for _ in 0..3 {
            let category = classifier.classify(Some("Corner Shop"), "sms").await.unwrap();
            assert_eq!(category, Category::Shopping);
        }
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(classifier.cached(), 1);
    }

    #[tokio::test]
    async fn merchantless_sms_is_never_cached() {
        let remote = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let classifier = MerchantClassifier::new(Some(remote.clone() as Arc<dyn Classifier>));

        classifier.classify(None, "Rs 500 paid for electricity bill").await.unwrap();
        classifier.classify(Some("  "), "Rs 200 spent at cinema").await.unwrap();
        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
        assert_eq!(classifier.cached(), 0);
    }
}
