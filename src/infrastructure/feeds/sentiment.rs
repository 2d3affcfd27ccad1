//! Headline sentiment scoring for the scout.
//!
//! VADER compound scores boosted with a crypto-specific keyword table, so
//! market jargon the general lexicon misses still moves the needle.

use vader_sentiment::SentimentIntensityAnalyzer;

/// Crypto keywords and their sentiment boosts layered over VADER.
const BULLISH_KEYWORDS: &[(&str, f64)] = &[
    ("surge", 0.4),
    ("surges", 0.4),
    ("rally", 0.4),
    ("rallies", 0.4),
    ("soar", 0.5),
    ("soars", 0.5),
    ("bullish", 0.5),
    ("bull run", 0.5),
    ("all-time high", 0.5),
    ("ath", 0.4),
    ("breakout", 0.3),
    ("mooning", 0.5),
    ("pump", 0.3),
    ("adoption", 0.2),
    ("institutional", 0.2),
    ("airdrop", 0.2),
    ("tvl growth", 0.3),
    ("restaking", 0.2),
    ("upgrade", 0.3),
    ("graduated", 0.2),
];

const BEARISH_KEYWORDS: &[(&str, f64)] = &[
    ("crash", -0.5),
    ("crashes", -0.5),
    ("plunge", -0.5),
    ("plunges", -0.5),
    ("dump", -0.4),
    ("dumps", -0.4),
    ("bearish", -0.5),
    ("collapse", -0.5),
    ("depeg", -0.5),
    ("exploit", -0.6),
    ("drained", -0.6),
    ("rug", -0.6),
    ("rugged", -0.6),
    ("hack", -0.5),
    ("hacked", -0.5),
    ("stolen", -0.5),
    ("liquidations", -0.4),
    ("sell-off", -0.4),
    ("selloff", -0.4),
    ("panic", -0.4),
    ("fear", -0.3),
];

/// Threshold above which a headline counts as bullish, below the negation
/// as bearish.
pub const SENTIMENT_THRESHOLD: f64 = 0.3;

pub struct SentimentScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl SentimentScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }

    fn keyword_boost(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let mut boost = 0.0;
        for (keyword, score) in BULLISH_KEYWORDS {
            if lower.contains(keyword) {
                boost += score;
            }
        }
        for (keyword, score) in BEARISH_KEYWORDS {
            if lower.contains(keyword) {
                boost += score; // already negative
            }
        }
        boost
    }

    /// Score a single piece of text in [-1, 1].
    pub fn score(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }
        let scores = self.analyzer.polarity_scores(text);
        let compound = scores["compound"];
        (compound + self.keyword_boost(text) * 0.5).clamp(-1.0, 1.0)
    }

    /// Score a headline + body pair, weighting the headline higher.
    pub fn score_item(&self, title: &str, body: &str) -> f64 {
        self.score(title) * 0.7 + self.score(body) * 0.3
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bullish_headlines_score_positive() {
        let scorer = SentimentScorer::new();
        for headline in [
            "SOL rallies as restaking adoption accelerates",
            "Token surges after protocol upgrade ships",
            "Institutional inflows push TVL growth to new highs",
        ] {
            assert!(scorer.score(headline) > 0.0, "expected bullish: {}", headline);
        }
    }

    #[test]
    fn test_bearish_headlines_score_negative() {
        let scorer = SentimentScorer::new();
        for headline in [
            "Lending protocol drained in overnight exploit",
            "Stablecoin depeg triggers cascading liquidations",
            "Market panic as major fund dumps holdings",
        ] {
            assert!(scorer.score(headline) < 0.0, "expected bearish: {}", headline);
        }
    }

    #[test]
    fn test_empty_text_is_neutral() {
        let scorer = SentimentScorer::new();
        assert_eq!(scorer.score(""), 0.0);
        assert_eq!(scorer.score("   "), 0.0);
    }

    #[test]
    fn test_headline_weighted_over_body() {
        let scorer = SentimentScorer::new();
        let score = scorer.score_item(
            "Protocol exploit drains treasury",
            "The team is investigating and will post updates.",
        );
        assert!(score < 0.0);
    }
}
