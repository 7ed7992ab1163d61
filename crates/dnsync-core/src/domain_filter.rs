// # Domain Filter
//
// Decides whether a DNS name is inside the set of names this installation
// may manage.
//
// ## Modes
//
// A filter is either suffix-based or regex-based, never both:
//
// - **Suffix**: include/exclude lists of normalized domains. `example.org`
//   matches the apex and every subdomain, `.example.org` matches subdomains
//   only.
// - **Regex**: optional include and exclude patterns applied to the
//   normalized name.
//
// An unconfigured filter matches everything.
//
// ## Normalization
//
// Both rules and candidates are trimmed, stripped of one trailing dot,
// lower-cased and passed through UTS #46 so that `xn--c1yn36f.org` and
// `點看.org` compare equal. The Unicode form is the canonical one.
//
// ## Serialized form
//
// ```json
// {"include": ["example.org"], "exclude": ["api.example.org"]}
// {"regexInclude": "\\.org$", "regexExclude": "^internal\\."}
// ```
//
// Deserialization is the only place where the two modes can be mixed, so it
// is where that is rejected.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Include/exclude rule set used to scope DNS names
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "DomainFilterSerde", into = "DomainFilterSerde")]
pub struct DomainFilter {
    rules: FilterRules,
}

/// The two mutually exclusive rule representations
#[derive(Debug, Clone)]
enum FilterRules {
    Suffix {
        include: Vec<String>,
        exclude: Vec<String>,
    },
    Regex {
        include: Option<Regex>,
        exclude: Option<Regex>,
    },
}

impl Default for FilterRules {
    fn default() -> Self {
        FilterRules::Suffix {
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl DomainFilter {
    /// Suffix filter with inclusion rules only
    pub fn new<I, S>(include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_exclusions(include, std::iter::empty::<&str>())
    }

    /// Suffix filter with inclusion and exclusion rules
    ///
    /// Empty and whitespace-only rules are discarded.
    pub fn with_exclusions<I, S, E, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        E: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            rules: FilterRules::Suffix {
                include: prepare_rules(include),
                exclude: prepare_rules(exclude),
            },
        }
    }

    /// Regex filter
    ///
    /// A pattern with an empty source is treated as absent.
    pub fn regex(include: Option<Regex>, exclude: Option<Regex>) -> Self {
        Self {
            rules: FilterRules::Regex {
                include: include.filter(|re| !re.as_str().is_empty()),
                exclude: exclude.filter(|re| !re.as_str().is_empty()),
            },
        }
    }

    /// Build a filter from loosely-assembled configuration
    ///
    /// Applies the same validation as deserialization: list rules and
    /// regex rules cannot be combined, and patterns must compile.
    pub fn from_parts(
        include: Vec<String>,
        exclude: Vec<String>,
        regex_include: Option<String>,
        regex_exclude: Option<String>,
    ) -> Result<Self> {
        Self::try_from(DomainFilterSerde {
            include: Some(include),
            exclude: Some(exclude),
            regex_include,
            regex_exclude,
        })
    }

    /// Whether `name` is inside the managed set
    pub fn matches(&self, name: &str) -> bool {
        match &self.rules {
            FilterRules::Suffix { include, exclude } => {
                let name = normalize_domain(name);
                match_suffix(include, &name, true) && !match_suffix(exclude, &name, false)
            }
            FilterRules::Regex { include, exclude } => {
                let name = normalize_domain(name);
                let included = include.as_ref().is_none_or(|re| re.is_match(&name));
                let excluded = exclude.as_ref().is_some_and(|re| re.is_match(&name));
                included && !excluded
            }
        }
    }

    /// Whether `name` could be a parent zone for one of the managed names
    ///
    /// True when `name` equals an inclusion rule or is one of its ancestors.
    /// Subdomain-only rules (leading dot) never admit a parent.
    pub fn matches_parent(&self, name: &str) -> bool {
        match &self.rules {
            FilterRules::Suffix { include, exclude } => {
                let name = normalize_domain(name);
                if match_suffix(exclude, &name, false) {
                    return false;
                }
                if include.is_empty() {
                    return true;
                }
                let ancestor_suffix = format!(".{}", name);
                include
                    .iter()
                    .filter(|rule| !rule.starts_with('.'))
                    .any(|rule| *rule == name || rule.ends_with(&ancestor_suffix))
            }
            FilterRules::Regex { exclude, .. } => {
                // Ancestors of a pattern cannot be derived; only exclusion applies.
                let name = normalize_domain(name);
                !exclude.as_ref().is_some_and(|re| re.is_match(&name))
            }
        }
    }

    /// Whether any rule survived normalization
    pub fn is_configured(&self) -> bool {
        match &self.rules {
            FilterRules::Suffix { include, exclude } => !include.is_empty() || !exclude.is_empty(),
            FilterRules::Regex { include, exclude } => include.is_some() || exclude.is_some(),
        }
    }

    /// Whether this filter uses regex rules
    pub fn is_regex(&self) -> bool {
        matches!(self.rules, FilterRules::Regex { .. })
    }
}

/// Normalize a DNS name for comparison
///
/// Trims whitespace, strips one trailing dot, lower-cases and converts
/// ASCII-compatible labels to Unicode. A leading dot is preserved.
pub fn normalize_domain(domain: &str) -> String {
    let trimmed = domain.trim();
    let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
    let (prefix, body) = match trimmed.strip_prefix('.') {
        Some(rest) => (".", rest),
        None => ("", trimmed),
    };

    let lowered = body.to_lowercase();
    if lowered.is_empty() {
        return format!("{}{}", prefix, lowered);
    }

    let (unicode, result) = idna::domain_to_unicode(&lowered);
    match result {
        Ok(()) => format!("{}{}", prefix, unicode),
        Err(e) => {
            debug!("Failed to convert domain {} to unicode: {:?}", lowered, e);
            format!("{}{}", prefix, lowered)
        }
    }
}

fn prepare_rules<I, S>(rules: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    rules
        .into_iter()
        .map(|rule| normalize_domain(rule.as_ref()))
        .filter(|rule| !rule.is_empty() && rule != ".")
        .collect()
}

fn match_suffix(rules: &[String], name: &str, empty_value: bool) -> bool {
    if rules.is_empty() {
        return empty_value;
    }

    rules.iter().any(|rule| {
        if rule.starts_with('.') {
            name.ends_with(rule.as_str())
        } else {
            name == rule
                || name
                    .strip_suffix(rule.as_str())
                    .is_some_and(|head| head.ends_with('.'))
        }
    })
}

/// Wire representation of a [`DomainFilter`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainFilterSerde {
    #[serde(default, skip_serializing_if = "is_empty_list")]
    include: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "is_empty_list")]
    exclude: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    regex_include: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    regex_exclude: Option<String>,
}

fn is_empty_list(list: &Option<Vec<String>>) -> bool {
    list.as_ref().is_none_or(|list| list.is_empty())
}

fn compile_pattern(key: &str, pattern: Option<String>) -> Result<Option<Regex>> {
    match pattern {
        Some(pattern) if !pattern.is_empty() => Regex::new(&pattern)
            .map(Some)
            .map_err(|e| Error::config(format!("invalid {}: {}", key, e))),
        _ => Ok(None),
    }
}

impl TryFrom<DomainFilterSerde> for DomainFilter {
    type Error = Error;

    fn try_from(raw: DomainFilterSerde) -> Result<Self> {
        let has_list = !is_empty_list(&raw.include) || !is_empty_list(&raw.exclude);
        let has_regex = raw.regex_include.as_deref().is_some_and(|p| !p.is_empty())
            || raw.regex_exclude.as_deref().is_some_and(|p| !p.is_empty());

        if has_list && has_regex {
            return Err(Error::config("cannot have both domain list and regex"));
        }

        if has_regex {
            let include = compile_pattern("regexInclude", raw.regex_include)?;
            let exclude = compile_pattern("regexExclude", raw.regex_exclude)?;
            return Ok(Self::regex(include, exclude));
        }

        Ok(Self::with_exclusions(
            raw.include.unwrap_or_default(),
            raw.exclude.unwrap_or_default(),
        ))
    }
}

impl From<DomainFilter> for DomainFilterSerde {
    fn from(filter: DomainFilter) -> Self {
        match filter.rules {
            FilterRules::Suffix {
                mut include,
                mut exclude,
            } => {
                include.sort();
                include.dedup();
                exclude.sort();
                exclude.dedup();
                DomainFilterSerde {
                    include: Some(include),
                    exclude: Some(exclude),
                    ..Default::default()
                }
            }
            FilterRules::Regex { include, exclude } => DomainFilterSerde {
                regex_include: include.map(|re| re.as_str().to_string()),
                regex_exclude: exclude.map(|re| re.as_str().to_string()),
                ..Default::default()
            },
        }
    }
}
