//! Title/description classification into (category, subcategory).
//!
//! Both tables are scanned in declared order and the first rule with any
//! matching substring wins, so table order is part of the contract. Override
//! keywords are checked before either table.

use serde::{Deserialize, Serialize};

use crate::domain::Classification;

/// One ordered table entry: a label and the substrings that select it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub label: String,
    pub patterns: Vec<String>,
}

impl PatternRule {
    pub fn new(label: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            label: label.into(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| !p.is_empty() && text.contains(p.as_str()))
    }
}

/// Keywords that force a fixed classification regardless of the tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub keywords: Vec<String>,
    pub category: String,
    pub subcategory: String,
}

/// Classification tables as loaded from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationTables {
    /// Ordered category table
    #[serde(default = "default_categories")]
    pub categories: Vec<PatternRule>,

    /// Ordered subcategory table
    #[serde(default = "default_subcategories")]
    pub subcategories: Vec<PatternRule>,

    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,

    #[serde(default = "default_fallback_subcategory")]
    pub fallback_subcategory: String,

    #[serde(default = "default_overrides")]
    pub overrides: Option<OverrideRule>,
}

fn default_fallback_category() -> String {
    "Unclassified".to_string()
}

fn default_fallback_subcategory() -> String {
    "General".to_string()
}

fn default_overrides() -> Option<OverrideRule> {
    Some(OverrideRule {
        keywords: vec![
            "special".to_string(),
            "event".to_string(),
            "announcement".to_string(),
        ],
        category: "Special_Series".to_string(),
        subcategory: "Events".to_string(),
    })
}

fn default_subcategories() -> Vec<PatternRule> {
    vec![
        PatternRule::new("Daf_Yomi", &["daf yomi"]),
        PatternRule::new("Shiurim", &["shiur"]),
        PatternRule::new("Lectures", &["lecture"]),
    ]
}

fn default_categories() -> Vec<PatternRule> {
    vec![
        PatternRule::new("Berachos", &["berachos", "berakhot", "brachot"]),
        PatternRule::new("Shabbos", &["shabbos", "shabbat"]),
        PatternRule::new("Eruvin", &["eruvin"]),
        PatternRule::new("Pesachim", &["pesachim"]),
        PatternRule::new("Shekalim", &["shekalim"]),
        PatternRule::new("Yoma", &["yoma"]),
        PatternRule::new("Sukkah", &["sukkah"]),
        PatternRule::new("Beitzah", &["beitzah", "beitza"]),
        PatternRule::new("Rosh_Hashanah", &["rosh hashanah", "rosh_hashanah"]),
        PatternRule::new("Taanis", &["taanis", "taanit"]),
        PatternRule::new("Megillah", &["megillah"]),
        PatternRule::new("Moed_Katan", &["moed katan", "moed_katan"]),
        PatternRule::new("Chagigah", &["chagigah"]),
        PatternRule::new("Yevamos", &["yevamos", "yevamot"]),
        PatternRule::new("Kesubos", &["kesubos", "ketubbot"]),
        PatternRule::new("Nedarim", &["nedarim"]),
        PatternRule::new("Nazir", &["nazir"]),
        PatternRule::new("Sotah", &["sotah"]),
        PatternRule::new("Gittin", &["gittin"]),
        PatternRule::new("Kiddushin", &["kiddushin"]),
        PatternRule::new("Bava_Kamma", &["bava kamma", "bava_kamma"]),
        PatternRule::new("Bava_Metzia", &["bava metzia", "bava_metzia"]),
        PatternRule::new("Bava_Basra", &["bava basra", "bava_basra"]),
        PatternRule::new("Sanhedrin", &["sanhedrin"]),
        PatternRule::new("Makkos", &["makkos", "makkot"]),
        PatternRule::new("Shevuos", &["shevuos", "shevuot"]),
        PatternRule::new("Avodah_Zarah", &["avodah zarah", "avodah_zarah"]),
        PatternRule::new("Horayos", &["horayos", "horayot"]),
        PatternRule::new("Zevachim", &["zevachim"]),
        PatternRule::new("Menachos", &["menachos", "menachot"]),
        PatternRule::new("Chullin", &["chullin"]),
        PatternRule::new("Bechorot", &["bechorot", "bechoros"]),
        PatternRule::new("Arachin", &["arachin"]),
        PatternRule::new("Temurah", &["temurah"]),
        PatternRule::new("Kerisos", &["kerisos", "keritot"]),
        PatternRule::new("Meilah", &["meilah"]),
        PatternRule::new("Kinnim", &["kinnim"]),
        PatternRule::new("Tamid", &["tamid"]),
        PatternRule::new("Midos", &["midos", "midot"]),
        PatternRule::new("Niddah", &["niddah"]),
    ]
}

impl Default for ClassificationTables {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            subcategories: default_subcategories(),
            fallback_category: default_fallback_category(),
            fallback_subcategory: default_fallback_subcategory(),
            overrides: default_overrides(),
        }
    }
}

impl ClassificationTables {
    /// Every category label a classification can produce, in table order
    pub fn category_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.categories.iter().map(|r| r.label.as_str()).collect();
        labels.push(&self.fallback_category);
        if let Some(ref o) = self.overrides {
            if !labels.contains(&o.category.as_str()) {
                labels.push(&o.category);
            }
        }
        labels
    }
}

/// Pattern-table classifier.
///
/// Holds a lower-cased copy of the tables so matching is case-insensitive on
/// both sides.
#[derive(Debug, Clone)]
pub struct Classifier {
    tables: ClassificationTables,
}

impl Classifier {
    pub fn new(tables: &ClassificationTables) -> Self {
        let lower = |rules: &[PatternRule]| -> Vec<PatternRule> {
            rules
                .iter()
                .map(|r| PatternRule {
                    label: r.label.clone(),
                    patterns: r.patterns.iter().map(|p| p.to_lowercase()).collect(),
                })
                .collect()
        };

        let overrides = tables.overrides.as_ref().map(|o| OverrideRule {
            keywords: o.keywords.iter().map(|k| k.to_lowercase()).collect(),
            category: o.category.clone(),
            subcategory: o.subcategory.clone(),
        });

        Self {
            tables: ClassificationTables {
                categories: lower(&tables.categories),
                subcategories: lower(&tables.subcategories),
                fallback_category: tables.fallback_category.clone(),
                fallback_subcategory: tables.fallback_subcategory.clone(),
                overrides,
            },
        }
    }

    pub fn category_labels(&self) -> Vec<&str> {
        self.tables.category_labels()
    }

    /// Classify a title and optional description
    pub fn classify(&self, title: &str, description: Option<&str>) -> Classification {
        let text = format!(
            "{} {}",
            title.to_lowercase(),
            description.unwrap_or_default().to_lowercase()
        );

        if let Some(ref o) = self.tables.overrides {
            if o.keywords.iter().any(|k| !k.is_empty() && text.contains(k.as_str())) {
                return Classification::new(&o.category, &o.subcategory);
            }
        }

        let category = first_match(&self.tables.categories, &text)
            .unwrap_or(&self.tables.fallback_category);
        let subcategory = first_match(&self.tables.subcategories, &text)
            .unwrap_or(&self.tables.fallback_subcategory);

        Classification::new(category, subcategory)
    }
}

fn first_match<'a>(rules: &'a [PatternRule], text: &str) -> Option<&'a String> {
    rules.iter().find(|r| r.matches(text)).map(|r| &r.label)
}
