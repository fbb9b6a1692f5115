//! Interactive toy finder.
//!
//! The menu is a small state machine: [`Finder::handle`] maps one line of
//! input to the next [`FinderState`] plus an [`Effect`]; [`run`] performs the
//! effects against the store and owns all terminal I/O. [`run_quick`] asks
//! for one age, shows that search and returns.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{BufRead, Write};
use tracing::debug;

use crate::database_ops::db::Db;
use crate::database_ops::search::{
    age_ranges, available_features, price_range, search_toys, toy_types, SearchCriteria,
    ToyListing,
};

pub const MAX_AGE_YEARS: f64 = 12.0;
/// Results printed by a quick search before offering the rest.
pub const QUICK_SHOWN: usize = 10;
pub const ADVANCED_LIMIT: i64 = 50;
/// Features offered for selection in the advanced search.
pub const FEATURE_MENU: usize = 20;

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum FinderState {
    MainMenu,
    QuickAge,
    AdvancedAge,
    AdvancedBudget {
        years: f64,
    },
    AdvancedKeywords {
        years: f64,
        max_price: Option<f64>,
    },
    AdvancedFeatures {
        years: f64,
        max_price: Option<f64>,
        text: Option<String>,
    },
    ConfirmShowAll,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Nothing to do beyond prompting again.
    Idle,
    Notice(&'static str),
    ShowFeatureMenu,
    QuickSearch { years: f64 },
    AdvancedSearch { criteria: SearchCriteria, notice: Option<&'static str> },
    ListFeatures,
    ShowStatistics,
    ShowRemaining,
    /// The overflow was declined; only the total is printed.
    SkipRemaining,
    Exit,
}

/// Menu state plus the feature names offered in the advanced search.
#[derive(Debug, Clone)]
pub struct Finder {
    state: FinderState,
    features: Vec<String>,
    /// Exit after the first quick search instead of returning to the menu.
    single_search: bool,
}

impl Finder {
    pub fn new(features: Vec<String>) -> Self {
        Self {
            state: FinderState::MainMenu,
            features,
            single_search: false,
        }
    }

    /// Starts at the age prompt and exits once that search has been shown.
    pub fn quick() -> Self {
        Self {
            state: FinderState::QuickAge,
            features: Vec::new(),
            single_search: true,
        }
    }

    fn after_search(&self) -> FinderState {
        if self.single_search {
            FinderState::Exit
        } else {
            FinderState::MainMenu
        }
    }

    pub fn state(&self) -> &FinderState {
        &self.state
    }

    pub fn prompt(&self) -> &'static str {
        match self.state {
            FinderState::MainMenu => "Enter your choice (1-5): ",
            FinderState::QuickAge | FinderState::AdvancedAge => {
                "Age in years (e.g. 2.5): "
            }
            FinderState::AdvancedBudget { .. } => "Enter max budget (press Enter for no limit): ",
            FinderState::AdvancedKeywords { .. } => {
                "Any keywords to search for? (press Enter to skip): "
            }
            FinderState::AdvancedFeatures { .. } => {
                "Enter feature numbers (comma-separated, or press Enter to skip): "
            }
            FinderState::ConfirmShowAll => "Show all results? (y/n): ",
            FinderState::Exit => "",
        }
    }

    /// Quick search results arrived; offer the overflow when there is any.
    pub fn quick_results(&mut self, total: usize) {
        self.state = if total > QUICK_SHOWN {
            FinderState::ConfirmShowAll
        } else {
            self.after_search()
        };
    }

    pub fn handle(&mut self, input: &str) -> Effect {
        let input = input.trim();
        let state = std::mem::replace(&mut self.state, FinderState::MainMenu);
        let (next, effect) = match state {
            FinderState::MainMenu => match input {
                "1" => (FinderState::QuickAge, Effect::Idle),
                "2" => (FinderState::AdvancedAge, Effect::Idle),
                "3" => (FinderState::MainMenu, Effect::ListFeatures),
                "4" => (FinderState::MainMenu, Effect::ShowStatistics),
                "5" => (FinderState::Exit, Effect::Exit),
                _ => (
                    FinderState::MainMenu,
                    Effect::Notice("Invalid choice, please try again."),
                ),
            },
            FinderState::QuickAge => match parse_age(input) {
                // The state is settled by `quick_results` once the search ran.
                Ok(years) => (FinderState::MainMenu, Effect::QuickSearch { years }),
                Err(msg) => (FinderState::QuickAge, Effect::Notice(msg)),
            },
            FinderState::AdvancedAge => match parse_age(input) {
                Ok(years) => (FinderState::AdvancedBudget { years }, Effect::Idle),
                Err(msg) => (FinderState::AdvancedAge, Effect::Notice(msg)),
            },
            FinderState::AdvancedBudget { years } => {
                let (max_price, notice) = parse_budget(input);
                let effect = notice.map_or(Effect::Idle, Effect::Notice);
                (FinderState::AdvancedKeywords { years, max_price }, effect)
            }
            FinderState::AdvancedKeywords { years, max_price } => {
                let text = (!input.is_empty()).then(|| input.to_string());
                (
                    FinderState::AdvancedFeatures {
                        years,
                        max_price,
                        text,
                    },
                    Effect::ShowFeatureMenu,
                )
            }
            FinderState::AdvancedFeatures {
                years,
                max_price,
                text,
            } => {
                let (features, notice) = match select_features(input, &self.features) {
                    Ok(selected) => (selected, None),
                    Err(msg) => (Vec::new(), Some(msg)),
                };
                let mut criteria = SearchCriteria::default()
                    .at_age_years(years)
                    .price_between(None, max_price)
                    .with_features(features)
                    .limited_to(ADVANCED_LIMIT);
                criteria.text = text;
                (
                    FinderState::MainMenu,
                    Effect::AdvancedSearch { criteria, notice },
                )
            }
            FinderState::ConfirmShowAll => {
                let effect = if input.eq_ignore_ascii_case("y") {
                    Effect::ShowRemaining
                } else {
                    Effect::SkipRemaining
                };
                (self.after_search(), effect)
            }
            FinderState::Exit => (FinderState::Exit, Effect::Exit),
        };
        debug!(state = ?next, "finder transition");
        self.state = next;
        effect
    }

    /// Feature names shown in the advanced-search menu.
    pub fn menu_features(&self) -> &[String] {
        &self.features[..self.features.len().min(FEATURE_MENU)]
    }

    pub fn hidden_features(&self) -> usize {
        self.features.len().saturating_sub(FEATURE_MENU)
    }
}

/// Age in years, 0 to 12 inclusive.
pub fn parse_age(input: &str) -> Result<f64, &'static str> {
    let years: f64 = input
        .trim()
        .parse()
        .map_err(|_| "Please enter a valid number.")?;
    if !(0.0..=MAX_AGE_YEARS).contains(&years) {
        return Err("Please enter an age between 0 and 12 years.");
    }
    Ok(years)
}

/// Blank means no limit; garbage drops the price filter with a notice.
pub fn parse_budget(input: &str) -> (Option<f64>, Option<&'static str>) {
    let input = input.trim();
    if input.is_empty() {
        return (None, None);
    }
    match input.parse::<f64>() {
        Ok(v) if v.is_finite() => (Some(v), None),
        _ => (None, Some("Invalid budget, ignoring price filter.")),
    }
}

/// 1-based, comma-separated picks from `features`. Out-of-range numbers are
/// ignored; any unparsable number voids the whole selection.
pub fn select_features(input: &str, features: &[String]) -> Result<Vec<String>, &'static str> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let mut picked = Vec::new();
    for part in input.split(',') {
        let n: usize = part
            .trim()
            .parse()
            .map_err(|_| "Invalid feature selection, skipping feature filter.")?;
        if let Some(name) = n.checked_sub(1).and_then(|i| features.get(i)) {
            if !picked.contains(name) {
                picked.push(name.clone());
            }
        }
    }
    Ok(picked)
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn banner(title: &str) -> String {
    let rule = rule();
    format!("\n{rule}\n{title}\n{rule}")
}

fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) if p.fract() == 0.0 => format!("₹{p:.0}"),
        Some(p) => format!("₹{p:.2}"),
        None => "n/a".to_string(),
    }
}

fn format_ages(min: Option<i64>, max: Option<i64>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("{}-{} years ({lo}-{hi} months)", lo / 12, hi / 12),
        _ => "unspecified".to_string(),
    }
}

/// Human-readable block for one search hit, numbered from 1.
pub fn render_toy(index: usize, listing: &ToyListing, link_base: &str) -> String {
    let toy = &listing.toy;
    let mut out = String::new();
    let _ = writeln!(out, "{}", banner(&format!("#{index}. {}", toy.name)));
    let _ = writeln!(out, "Price: {}", format_price(toy.price));
    let _ = writeln!(out, "Age Range: {}", format_ages(toy.min_age, toy.max_age));
    if let Some(desc) = toy.short_description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "Description: {desc}");
    }
    if !listing.features.is_empty() {
        let _ = writeln!(out, "Features: {}", listing.features.join(", "));
    }
    if let Some(first) = listing.images.first() {
        let _ = writeln!(out, "Images: {} available", listing.images.len());
        if let Some(src) = first.source() {
            let _ = writeln!(out, "   View: {src}");
        }
    }
    if let Some(slug) = toy.slug.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "URL: {link_base}/{slug}");
    }
    out
}

fn total_line(count: usize) -> String {
    let rule = rule();
    format!("\n{rule}\nTotal: {count} toys found\n{rule}")
}

/// Search at one age and print the first [`QUICK_SHOWN`] hits.
pub async fn print_for_age<W: Write>(db: &Db, years: f64, out: &mut W, link_base: &str) -> Result<()> {
    let hits = search_toys(db, &SearchCriteria::default().at_age_years(years)).await?;
    writeln!(out, "\nSearching for toys suitable for a {years} year old child...")?;
    if hits.is_empty() {
        writeln!(out, "No toys found for this age range.")?;
        return Ok(());
    }
    writeln!(out, "Found {} toys suitable for this age!", hits.len())?;
    for (i, hit) in hits.iter().take(QUICK_SHOWN).enumerate() {
        write!(out, "{}", render_toy(i + 1, hit, link_base))?;
    }
    Ok(())
}

async fn write_statistics<W: Write>(db: &Db, out: &mut W) -> Result<()> {
    writeln!(out, "{}", banner("DATABASE STATISTICS"))?;

    let mut by_years: BTreeMap<(i64, i64), usize> = BTreeMap::new();
    for range in age_ranges(db).await? {
        *by_years
            .entry((range.min_age / 12, range.max_age / 12))
            .or_default() += 1;
    }
    writeln!(out, "\nAge Ranges Available:")?;
    for ((lo, hi), n) in &by_years {
        writeln!(out, "   {lo}-{hi} years: {n} ranges")?;
    }

    let prices = price_range(db).await?;
    writeln!(
        out,
        "\nPrice Range: {} - {}",
        format_price(prices.min),
        format_price(prices.max)
    )?;

    let types = toy_types(db).await?;
    writeln!(out, "\nToy Types: {} types", types.len())?;
    for t in &types {
        writeln!(out, "   - {t}")?;
    }

    let features = available_features(db).await?;
    writeln!(out, "\nFeatures: {} unique features", features.len())?;
    Ok(())
}

fn write_main_menu<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "{}", banner("TOY FINDER - Main Menu"))?;
    writeln!(out, "1. Quick Search (by age only)")?;
    writeln!(out, "2. Advanced Search (with filters)")?;
    writeln!(out, "3. Browse All Features")?;
    writeln!(out, "4. Show Statistics")?;
    writeln!(out, "5. Exit")?;
    writeln!(out, "{}", rule())
}

/// Drive the finder until the user exits or input runs out.
pub async fn run<R: BufRead, W: Write>(db: &Db, input: R, out: &mut W, link_base: &str) -> Result<()> {
    let finder = Finder::new(available_features(db).await?);
    drive(db, finder, input, out, link_base).await
}

/// One quick search by age, without the menu.
pub async fn run_quick<R: BufRead, W: Write>(
    db: &Db,
    input: R,
    out: &mut W,
    link_base: &str,
) -> Result<()> {
    drive(db, Finder::quick(), input, out, link_base).await
}

async fn drive<R: BufRead, W: Write>(
    db: &Db,
    mut finder: Finder,
    mut input: R,
    out: &mut W,
    link_base: &str,
) -> Result<()> {
    let mut pending: Vec<ToyListing> = Vec::new();

    loop {
        match finder.state() {
            FinderState::Exit => break,
            FinderState::MainMenu => write_main_menu(out)?,
            FinderState::AdvancedBudget { .. } => {
                let prices = price_range(db).await?;
                writeln!(
                    out,
                    "Available price range: {} - {}",
                    format_price(prices.min),
                    format_price(prices.max)
                )?;
            }
            _ => {}
        }
        write!(out, "{}", finder.prompt())?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        match finder.handle(&line) {
            Effect::Idle => {}
            Effect::Notice(msg) => writeln!(out, "{msg}")?,
            Effect::ShowFeatureMenu => {
                writeln!(out, "\nAvailable features:")?;
                for (i, name) in finder.menu_features().iter().enumerate() {
                    writeln!(out, "   {}. {name}", i + 1)?;
                }
                if finder.hidden_features() > 0 {
                    writeln!(out, "   ... and {} more", finder.hidden_features())?;
                }
            }
            Effect::QuickSearch { years } => {
                let hits = search_toys(db, &SearchCriteria::default().at_age_years(years)).await?;
                if hits.is_empty() {
                    writeln!(out, "No toys found for this age range.")?;
                } else {
                    writeln!(out, "\nFound {} toys suitable for this age!", hits.len())?;
                }
                for (i, hit) in hits.iter().take(QUICK_SHOWN).enumerate() {
                    write!(out, "{}", render_toy(i + 1, hit, link_base))?;
                }
                finder.quick_results(hits.len());
                if hits.len() > QUICK_SHOWN {
                    writeln!(out, "\n... and {} more toys available!", hits.len() - QUICK_SHOWN)?;
                    pending = hits;
                } else {
                    writeln!(out, "{}", total_line(hits.len()))?;
                }
            }
            Effect::ShowRemaining => {
                for (i, hit) in pending.iter().enumerate().skip(QUICK_SHOWN) {
                    write!(out, "{}", render_toy(i + 1, hit, link_base))?;
                }
                writeln!(out, "{}", total_line(pending.len()))?;
                pending.clear();
            }
            Effect::SkipRemaining => writeln!(out, "{}", total_line(pending.len()))?,
            Effect::AdvancedSearch { criteria, notice } => {
                if let Some(msg) = notice {
                    writeln!(out, "{msg}")?;
                }
                let hits = search_toys(db, &criteria).await?;
                if hits.is_empty() {
                    writeln!(out, "No toys found matching your criteria.")?;
                } else {
                    for (i, hit) in hits.iter().enumerate() {
                        write!(out, "{}", render_toy(i + 1, hit, link_base))?;
                    }
                    writeln!(out, "{}", total_line(hits.len()))?;
                }
            }
            Effect::ListFeatures => {
                writeln!(out, "{}", banner("ALL AVAILABLE FEATURES"))?;
                let features = available_features(db).await?;
                for (i, name) in features.iter().enumerate() {
                    writeln!(out, "{:3}. {name}", i + 1)?;
                }
                writeln!(out, "\nTotal: {} features", features.len())?;
            }
            Effect::ShowStatistics => write_statistics(db, out).await?,
            Effect::Exit => {
                writeln!(out, "\nThank you for using Toy Finder! Happy toy shopping!")?;
            }
        }
        // Drop stale overflow once the confirmation has been answered.
        if finder.state() != &FinderState::ConfirmShowAll {
            pending.clear();
        }
    }
    Ok(())
}
