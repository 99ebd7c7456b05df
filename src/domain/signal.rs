//! Announcement signals
//!
//! A signal is one inbound text event. Two announcement shapes are traded:
//! - "... XAIUSDT perpetual futures will launch ..." (pair tokens in the text)
//! - "... will list Pepe (PEPE) ..." (base symbols in parentheses)

use regex::Regex;
use std::fmt;

use super::ticker::Instrument;

/// Phrase marking a futures-launch announcement
pub const FUTURES_PHRASE: &str = "futures will launch";

/// Phrase marking a spot-listing announcement
pub const LISTING_PHRASE: &str = "will list";

/// Inbound text event tagged with its source channel
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub channel_id: i64,
    pub text: String,
}

impl Signal {
    pub fn new(channel_id: i64, text: impl Into<String>) -> Self {
        Self {
            channel_id,
            text: text.into(),
        }
    }
}

/// Announcement kind; selects the extraction pattern and the tier table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalType {
    FuturesLaunch,
    SpotListing,
}

impl SignalType {
    /// Classify a message by case-insensitive phrase match.
    ///
    /// The futures phrase is checked first and wins if both appear.
    pub fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains(FUTURES_PHRASE) {
            Some(SignalType::FuturesLaunch)
        } else if lower.contains(LISTING_PHRASE) {
            Some(SignalType::SpotListing)
        } else {
            None
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::FuturesLaunch => write!(f, "futures-launch"),
            SignalType::SpotListing => write!(f, "spot-listing"),
        }
    }
}

/// A classified signal with the instruments it names
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSignal {
    pub signal_type: SignalType,
    pub instruments: Vec<Instrument>,
}

/// Extracts instruments from announcement text for one quote asset
#[derive(Debug, Clone)]
pub struct SignalParser {
    quote: String,
    pair_pattern: Regex,
    symbol_pattern: Regex,
}

impl SignalParser {
    pub fn new(quote: &str) -> Result<Self, regex::Error> {
        let quote = quote.to_ascii_uppercase();
        let pair_pattern = Regex::new(&format!(r"\b(\w+{})\b", regex::escape(&quote)))?;
        let symbol_pattern = Regex::new(r"\((\w+)\)")?;

        Ok(Self {
            quote,
            pair_pattern,
            symbol_pattern,
        })
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Classify the text and pull out its instruments.
    ///
    /// Returns `None` when no phrase matches or no instrument survives
    /// normalization. Repeated tickers are collapsed, first one wins.
    pub fn parse(&self, text: &str) -> Option<ParsedSignal> {
        let signal_type = SignalType::detect(text)?;

        let candidates: Vec<Instrument> = match signal_type {
            SignalType::FuturesLaunch => self
                .pair_pattern
                .captures_iter(text)
                .filter_map(|c| Instrument::from_pair(&c[1], &self.quote))
                .collect(),
            SignalType::SpotListing => self
                .symbol_pattern
                .captures_iter(text)
                .filter_map(|c| Instrument::new(&c[1], &self.quote))
                .collect(),
        };

        let mut instruments: Vec<Instrument> = Vec::with_capacity(candidates.len());
        for inst in candidates {
            if !instruments.contains(&inst) {
                instruments.push(inst);
            }
        }

        if instruments.is_empty() {
            return None;
        }

        Some(ParsedSignal {
            signal_type,
            instruments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> SignalParser {
        SignalParser::new("USDT").unwrap()
    }

    fn symbols(parsed: &ParsedSignal) -> Vec<String> {
        parsed.instruments.iter().map(|i| i.symbol()).collect()
    }

    #[test]
    fn test_detect_phrases_case_insensitive() {
        assert_eq!(
            SignalType::detect("XAIUSDT Perpetual Futures Will Launch soon"),
            Some(SignalType::FuturesLaunch)
        );
        assert_eq!(
            SignalType::detect("Binance WILL LIST Pepe (PEPE)"),
            Some(SignalType::SpotListing)
        );
        assert_eq!(SignalType::detect("maintenance notice"), None);
    }

    #[test]
    fn test_futures_phrase_wins() {
        let text = "we will list nothing, but XAIUSDT futures will launch";
        assert_eq!(SignalType::detect(text), Some(SignalType::FuturesLaunch));
    }

    #[test]
    fn test_parse_futures_pairs() {
        let parsed = parser()
            .parse("Binance Futures will launch USDⓈ-M 1000PEPEUSDT and XAIUSDT perpetual")
            .unwrap();
        assert_eq!(parsed.signal_type, SignalType::FuturesLaunch);
        assert_eq!(symbols(&parsed), vec!["PEPEUSDT", "XAIUSDT"]);
    }

    #[test]
    fn test_parse_listing_symbols() {
        let parsed = parser()
            .parse("Binance Will List Pepe (PEPE) and Floki (FLOKI)")
            .unwrap();
        assert_eq!(parsed.signal_type, SignalType::SpotListing);
        assert_eq!(symbols(&parsed), vec!["PEPEUSDT", "FLOKIUSDT"]);
    }

    #[test]
    fn test_parse_collapses_duplicates() {
        let parsed = parser()
            .parse("XAIUSDT futures will launch. Reminder: XAIUSDT")
            .unwrap();
        assert_eq!(symbols(&parsed), vec!["XAIUSDT"]);
    }

    #[test]
    fn test_parse_without_tickers_is_ignored() {
        assert!(parser().parse("New futures will launch next week").is_none());
        assert!(parser().parse("We will list a new coin").is_none());
    }

    #[test]
    fn test_parse_unrelated_text_is_ignored() {
        assert!(parser().parse("Wallet maintenance for PEPEUSDT (PEPE)").is_none());
    }
}
