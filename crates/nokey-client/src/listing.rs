//! Categorized console listing of the catalog
//!
//! A console convenience with no machine-readable contract: categories in
//! green, API names in blue, grouped the way the catalog orders them.

use crate::catalog::Catalog;
use colored::Colorize;
use std::fmt::Write;

/// Render the catalog as a categorized, colorized listing.
pub fn render(catalog: &Catalog) -> String {
  let mut out = String::new();

  for category in catalog.categories() {
    let _ = writeln!(out, "{}", category.green());
    let _ = writeln!(out, "{}", "-".repeat(category.len() + 6));
    for api in catalog.apis.iter().filter(|a| a.category == category) {
      let _ = writeln!(out, "{}", api.name.blue());
    }
    out.push('\n');
  }

  out
}
