//! Intent classification for business-data queries
//!
//! Categories, operations and time scope are detected from declarative
//! pattern tables so the heuristics can be tuned without touching the
//! classifier itself. Patterns are matched against the lowercased query and
//! cover both Polish and English phrasing.

use regex::RegexSet;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Business area a query is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryCategory {
    Recipes,
    Inventory,
    Orders,
    Production,
    Suppliers,
    Analytics,
    Quality,
    Costs,
}

/// What the query wants done with the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOperation {
    Count,
    List,
    Filter,
    Compare,
    Aggregate,
    Search,
}

const CATEGORY_PATTERNS: &[(QueryCategory, &[&str])] = &[
    (
        QueryCategory::Recipes,
        &[r"receptur", r"\brecipe", r"\bprzepis", r"\bformu[lł]", r"\bskładnik", r"\bingredient"],
    ),
    (
        QueryCategory::Inventory,
        &[
            r"\bmagazyn",
            r"\binventor",
            r"\bzapas",
            r"\bstock",
            r"\bsurow",
            r"\bmateria[lł]",
            r"\bparti[aie]\b",
            r"\bbatch",
        ],
    ),
    (
        QueryCategory::Orders,
        &[r"\bzamówi", r"\border", r"\bklient", r"\bcustomer", r"\bsprzeda", r"\bsales?\b"],
    ),
    (
        QueryCategory::Production,
        &[
            r"\bprodukc",
            r"\bproduction",
            r"\bmanufactur",
            r"\bharmonogram",
            r"\bschedul",
            r"\bzleceni",
            r"\bmo\b",
        ],
    ),
    (
        QueryCategory::Suppliers,
        &[r"\bdostawc", r"\bsupplier", r"\bvendor"],
    ),
    (
        QueryCategory::Analytics,
        &[
            r"\banaliz",
            r"\banaly",
            r"\btrend",
            r"\bstatysty",
            r"\braport",
            r"\breport",
            r"\bprognoz",
            r"\bforecast",
            r"\bkpi\b",
        ],
    ),
    (
        QueryCategory::Quality,
        &[
            r"\bjako[śs]",
            r"\bquality",
            r"\btest",
            r"\bcertyfika",
            r"\bcertific",
            r"\breklamac",
            r"\bcomplaint",
        ],
    ),
    (
        QueryCategory::Costs,
        &[
            r"\bkoszt",
            r"\bcost",
            r"\bcen[aiyę]?\b",
            r"\bprice",
            r"\bpricing",
            r"\bmarż",
            r"\bmargin",
            r"\bwartoś",
            r"\bvalue",
        ],
    ),
];

const OPERATION_PATTERNS: &[(QueryOperation, &[&str])] = &[
    (
        QueryOperation::Count,
        &[r"\bile\b", r"\bhow many\b", r"\bcount", r"\bliczb", r"\bnumber of\b", r"\bpolicz"],
    ),
    (
        QueryOperation::List,
        &[
            r"\bpoka[żz]",
            r"\bwy[śs]wietl",
            r"\blist",
            r"\bshow\b",
            r"\bwymie[nń]",
            r"\bjakie\b",
            r"\bwhat are\b",
        ],
    ),
    (
        QueryOperation::Filter,
        &[
            r"\bkt[óo]r(?:e|y|ych|a)\b",
            r"\bwhich\b",
            r"\bwhere\b",
            r"\bgdzie\b",
            r"\btylko\b",
            r"\bonly\b",
            r"\bpowy[żz]ej\b",
            r"\bponi[żz]ej\b",
            r"\babove\b",
            r"\bbelow\b",
            r"\bnisk",
            r"\blow\b",
        ],
    ),
    (
        QueryOperation::Compare,
        &[r"\bporówn", r"\bcompar", r"\bversus\b", r"\bvs\b", r"\bróżnic", r"\bdifference"],
    ),
    (
        QueryOperation::Aggregate,
        &[
            r"\bsum\b",
            r"\bsum[ayi]\b",
            r"\btotal\b",
            r"\bł[ąa]czn",
            r"\bśredni",
            r"\baverage",
            r"\brazem\b",
        ],
    ),
    (
        QueryOperation::Search,
        &[r"\bznajd[źz]", r"\bszukaj", r"\bwyszukaj", r"\bfind\b", r"\bsearch", r"\blookup\b"],
    ),
];

const RECENT_PATTERNS: &[&str] = &[
    r"\bostatni",
    r"\brecent",
    r"\blast (?:week|month|days?)\b",
    r"\bthis (?:week|month)\b",
    r"\bten (?:tydzień|miesiąc)\b",
    r"\bw tym (?:tygodniu|miesiącu)\b",
    r"\bdzisiaj\b",
    r"\bdziś\b",
    r"\btoday\b",
    r"\bwczoraj\b",
    r"\byesterday\b",
    r"\bnajnowsz",
    r"\blatest\b",
    r"\bnewest\b",
];

const PERIOD_PATTERNS: &[&str] = &[
    r"\b(?:19|20)\d{2}\b",
    r"\b(?:styczeń|stycznia|styczniu|luty|lutego|lutym|marzec|marca|marcu|kwiecień|kwietnia|kwietniu|maj|maja|maju|czerwiec|czerwca|czerwcu|lipiec|lipca|lipcu|sierpień|sierpnia|sierpniu|wrzesień|września|wrześniu|październik|października|październiku|listopad|listopada|listopadzie|grudzień|grudnia|grudniu)\b",
    r"\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\b",
    r"\bmiędzy\b",
    r"\bbetween\b",
    r"\bkwarta[lł]",
    r"\bquarter\b",
];

const HISTORICAL_PATTERNS: &[&str] = &[
    r"\bhistor",
    r"\ball[- ]time\b",
    r"\bwszystkie\b",
    r"\bkiedykolwiek\b",
    r"\bever\b",
    r"\bod początku\b",
];

const COMPLEX_PATTERNS: &[&str] = &[
    r"\bwhy\b",
    r"\bdlaczego\b",
    r"\bczemu\b",
    r"\bhow can\b",
    r"\bjak można\b",
    r"\bprzyczyn",
    r"\bwpływ",
    r"\bimpact\b",
    r"\bzależno",
];

/// Number of matched categories at which a query counts as complex
const COMPLEX_CATEGORY_COUNT: usize = 3;

fn compile(patterns: &[&str]) -> RegexSet {
    RegexSet::new(patterns).expect("classifier patterns are valid")
}

static CATEGORY_SETS: LazyLock<Vec<(QueryCategory, RegexSet)>> = LazyLock::new(|| {
    CATEGORY_PATTERNS
        .iter()
        .map(|(category, patterns)| (*category, compile(patterns)))
        .collect()
});

static OPERATION_SETS: LazyLock<Vec<(QueryOperation, RegexSet)>> = LazyLock::new(|| {
    OPERATION_PATTERNS
        .iter()
        .map(|(operation, patterns)| (*operation, compile(patterns)))
        .collect()
});

static RECENT: LazyLock<RegexSet> = LazyLock::new(|| compile(RECENT_PATTERNS));
static PERIOD: LazyLock<RegexSet> = LazyLock::new(|| compile(PERIOD_PATTERNS));
static HISTORICAL: LazyLock<RegexSet> = LazyLock::new(|| compile(HISTORICAL_PATTERNS));
static COMPLEX: LazyLock<RegexSet> = LazyLock::new(|| compile(COMPLEX_PATTERNS));

/// Time window a query refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeScope {
    pub recent: bool,
    pub period_bound: bool,
    pub historical: bool,
}

impl TimeScope {
    pub fn is_specified(&self) -> bool {
        self.recent || self.period_bound || self.historical
    }
}

/// Result of classifying one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnalysis {
    pub categories: BTreeSet<QueryCategory>,
    pub operations: BTreeSet<QueryOperation>,
    pub time_scope: TimeScope,
    /// How sure the classifier is about the intent (0-1)
    pub confidence: f64,
    pub is_single_category: bool,
    pub is_complex: bool,
}

impl QueryAnalysis {
    pub fn has_category(&self, category: QueryCategory) -> bool {
        self.categories.contains(&category)
    }

    pub fn has_operation(&self, operation: QueryOperation) -> bool {
        self.operations.contains(&operation)
    }

    /// True when counting is the only thing asked for
    pub fn is_count_only(&self) -> bool {
        self.operations.len() == 1 && self.has_operation(QueryOperation::Count)
    }
}

/// Classify a query into categories, operations and time scope
pub fn classify(query: &str) -> QueryAnalysis {
    let lower = query.to_lowercase();

    let categories: BTreeSet<QueryCategory> = CATEGORY_SETS
        .iter()
        .filter(|(_, set)| set.is_match(&lower))
        .map(|(category, _)| *category)
        .collect();

    let operations: BTreeSet<QueryOperation> = OPERATION_SETS
        .iter()
        .filter(|(_, set)| set.is_match(&lower))
        .map(|(operation, _)| *operation)
        .collect();

    let time_scope = TimeScope {
        recent: RECENT.is_match(&lower),
        period_bound: PERIOD.is_match(&lower),
        historical: HISTORICAL.is_match(&lower),
    };

    let is_single_category = categories.len() == 1;
    let is_complex = COMPLEX.is_match(&lower) || categories.len() >= COMPLEX_CATEGORY_COUNT;
    let confidence = confidence_score(categories.len(), operations.len(), &time_scope);

    QueryAnalysis {
        categories,
        operations,
        time_scope,
        confidence,
        is_single_category,
        is_complex,
    }
}

fn confidence_score(categories: usize, operations: usize, time_scope: &TimeScope) -> f64 {
    let mut score = 0.0;
    if categories > 0 {
        score += 0.4;
    }
    if categories == 1 {
        score += 0.2;
    }
    if operations > 0 {
        score += 0.3;
    }
    if time_scope.is_specified() {
        score += 0.1;
    }
    f64::min(score, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polish_recipe_count() {
        let analysis = classify("Ile jest receptur w systemie?");
        assert_eq!(analysis.categories, BTreeSet::from([QueryCategory::Recipes]));
        assert!(analysis.is_count_only());
        assert!(analysis.is_single_category);
        assert!(!analysis.is_complex);
        assert!((analysis.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_suppliers_and_recipes() {
        let analysis = classify("Pokaż dostawców dla receptur");
        assert!(analysis.has_category(QueryCategory::Suppliers));
        assert!(analysis.has_category(QueryCategory::Recipes));
        assert!(analysis.has_operation(QueryOperation::List));
        assert!(!analysis.is_single_category);
    }

    #[test]
    fn test_recent_orders() {
        let analysis = classify("Show the latest customer orders from last week");
        assert!(analysis.has_category(QueryCategory::Orders));
        assert!(analysis.time_scope.recent);
        assert!(!analysis.time_scope.period_bound);
    }

    #[test]
    fn test_period_bound() {
        let analysis = classify("Jakie były koszty produkcji w marcu 2024?");
        assert!(analysis.has_category(QueryCategory::Costs));
        assert!(analysis.has_category(QueryCategory::Production));
        assert!(analysis.time_scope.period_bound);
    }

    #[test]
    fn test_many_categories_is_complex() {
        let analysis = classify("Compare supplier prices with inventory levels and production schedule");
        assert!(analysis.categories.len() >= 3);
        assert!(analysis.is_complex);
        assert!(analysis.has_operation(QueryOperation::Compare));
    }

    #[test]
    fn test_why_is_complex() {
        let analysis = classify("Dlaczego zamówienie jest opóźnione?");
        assert!(analysis.is_complex);
        assert!(analysis.has_category(QueryCategory::Orders));
    }

    #[test]
    fn test_unclassified_query() {
        let analysis = classify("Hello there");
        assert!(analysis.categories.is_empty());
        assert!(analysis.operations.is_empty());
        assert_eq!(analysis.confidence, 0.0);
    }

    #[test]
    fn test_may_month_not_confused_with_verb() {
        assert!(!classify("Które surowce mają niski stan?").time_scope.period_bound);
        assert!(classify("Zamówienia z maja").time_scope.period_bound);
    }

    #[test]
    fn test_low_stock_filter() {
        let analysis = classify("Które materiały mają niski stan magazynowy?");
        assert!(analysis.has_category(QueryCategory::Inventory));
        assert!(analysis.has_operation(QueryOperation::Filter));
    }
}
