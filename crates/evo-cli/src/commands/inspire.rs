//! `evo inspire`: print a random quote.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::style::Palette;

const QUOTES: &str = include_str!("../quotes.txt");

/// `text - author` becomes `“text” – author`; anything else is kept as is.
pub fn format_quote(line: &str) -> String {
    match line.split_once(" - ") {
        Some((text, author)) => format!("“{text}” – {author}"),
        None => line.to_string(),
    }
}

pub fn pick_quote<R: Rng + ?Sized>(rng: &mut R) -> Option<String> {
    let quotes: Vec<&str> = QUOTES.lines().filter(|l| !l.trim().is_empty()).collect();
    quotes.choose(rng).map(|line| format_quote(line.trim()))
}

pub fn run(palette: Palette) -> Result<i32> {
    let quote = pick_quote(&mut rand::thread_rng()).context("no quotes available")?;
    println!("{}", palette.quote(&quote));
    Ok(0)
}
