//! Query characteristics and token estimation for tier selection

use super::ComplexityTier;
use regex::RegexSet;
use serde::Serialize;
use std::sync::LazyLock;

/// Inflation applied to the data size to approximate tokens for Polish text
pub const DATA_SIZE_INFLATION: f64 = 1.3;

static SIMPLE_COUNT: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\bhow many\b.*\b(?:is|are|do|does|exist)",
        r"\bcount of\b",
        r"\bnumber of\b.*\b(?:is|are)\b",
        r"^\s*ile\b",
        r"\bile\s+(?:jest|są|mamy|było|wynosi)\b",
        r"\bliczba\b",
    ])
    .expect("count patterns are valid")
});

static ANALYTICAL: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\banaly[sz]",
        r"\banaliz",
        r"\btrend",
        r"\bforecast",
        r"\bprognoz",
        r"\bcompar",
        r"\bporówn",
        r"\boptimi[sz]",
        r"\boptymaliz",
        r"\brecommend",
        r"\brekomend",
        r"\bzaproponuj",
    ])
    .expect("analytical patterns are valid")
});

static COMPLEX: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\bwhy\b",
        r"\bdlaczego\b",
        r"\bczemu\b",
        r"\bhow can\b",
        r"\bjak można\b",
        r"\bw jaki sposób\b",
        r"\bmechani[sz]m",
    ])
    .expect("complexity patterns are valid")
});

static CREATIVE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\bcreate\b",
        r"\bwrite\b",
        r"\bdesign\b",
        r"\bgenerate\b",
        r"\bstwórz\b",
        r"\bnapisz\b",
        r"\bzaprojektuj\b",
        r"\bwygeneruj\b",
    ])
    .expect("creativity patterns are valid")
});

/// Expected length of the model's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSize {
    Short,
    Medium,
    Long,
}

impl OutputSize {
    /// Estimated completion tokens
    pub fn tokens(&self) -> usize {
        match self {
            OutputSize::Short => 150,
            OutputSize::Medium => 500,
            OutputSize::Long => 1200,
        }
    }
}

/// Flags describing what kind of answer a query needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryCharacteristics {
    pub is_simple_count: bool,
    pub is_analytical: bool,
    pub is_complex: bool,
    pub requires_creativity: bool,
    pub output_size: OutputSize,
}

impl QueryCharacteristics {
    pub fn analyze(query: &str) -> Self {
        let lower = query.to_lowercase();

        let is_analytical = ANALYTICAL.is_match(&lower);
        let is_complex = COMPLEX.is_match(&lower);
        let requires_creativity = CREATIVE.is_match(&lower);
        let is_simple_count = SIMPLE_COUNT.is_match(&lower) && !is_analytical && !is_complex;

        let output_size = if is_simple_count {
            OutputSize::Short
        } else if is_analytical || is_complex || requires_creativity {
            OutputSize::Long
        } else {
            OutputSize::Medium
        };

        Self {
            is_simple_count,
            is_analytical,
            is_complex,
            requires_creativity,
            output_size,
        }
    }

    /// Tier use case this query calls for
    pub fn complexity_tier(&self) -> ComplexityTier {
        if self.is_simple_count {
            ComplexityTier::Simple
        } else if self.is_analytical || self.is_complex {
            ComplexityTier::HighAccuracy
        } else {
            ComplexityTier::Balanced
        }
    }

    /// Sampling temperature suited to the query
    pub fn temperature(&self) -> f32 {
        let mut temperature = 0.7;
        if self.is_simple_count {
            temperature = 0.1;
        }
        if self.is_analytical {
            temperature = 0.3;
        }
        if self.requires_creativity {
            temperature = 0.8;
        }
        temperature
    }
}

/// Token counts expected for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenEstimate {
    pub input: usize,
    pub output: usize,
    pub total: usize,
}

/// Estimate prompt and completion tokens from the context size
pub fn estimate_tokens(data_size: usize, output: OutputSize) -> TokenEstimate {
    let input = (data_size as f64 * DATA_SIZE_INFLATION).ceil() as usize;
    let output = output.tokens();
    TokenEstimate {
        input,
        output,
        total: input + output,
    }
}
