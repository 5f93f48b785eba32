// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cursor-based forward/backward pagination over an id-sorted record
//! stream (spec §4.2). Cursors are opaque strings equal to the entity's
//! id; ids are totally ordered by byte comparison.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Anything that can stand in a paged list needs a stable, totally-ordered
/// cursor — the entity's id.
pub trait Identified {
    fn cursor(&self) -> &str;
}

/// Relay-style forward/backward page arguments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageArgs {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub first: Option<i64>,
    #[serde(default)]
    pub last: Option<i64>,
}

impl PageArgs {
    pub fn first(n: i64) -> Self {
        Self { first: Some(n), ..Self::default() }
    }

    pub fn first_after(n: i64, after: impl Into<String>) -> Self {
        Self { first: Some(n), after: Some(after.into()), ..Self::default() }
    }

    pub fn last(n: i64) -> Self {
        Self { last: Some(n), ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
    pub total_count: usize,
}

struct PageOpts {
    first: usize,
    last: usize,
    after: Option<String>,
    before: Option<String>,
}

fn parse_page_opts(max_page_size: usize, args: &PageArgs) -> Result<PageOpts, PageError> {
    let mut first = 0usize;
    let mut last = 0usize;

    if let Some(f) = args.first {
        if f < 0 {
            return Err(PageError::InvalidArgument(format!("invalid 'first' field value: {f}")));
        }
        first = (f as usize).min(max_page_size);
    }

    if let Some(l) = args.last {
        if l < 0 {
            return Err(PageError::InvalidArgument(format!("invalid 'last' field value: {l}")));
        }
        last = (l as usize).min(max_page_size);
    }

    // If neither first nor last were supplied, return maxPageSize elements.
    if first == 0 && last == 0 {
        first = max_page_size;
    }

    for cursor in [&args.after, &args.before] {
        if let Some(c) = cursor {
            if c.is_empty() {
                return Err(PageError::InvalidArgument("cursor must not be empty".into()));
            }
        }
    }

    Ok(PageOpts { first, last, after: args.after.clone(), before: args.before.clone() })
}

/// Compute a page from a filtered, id-sorted record stream.
///
/// `records` need not already be sorted; this sorts ascending by
/// [`Identified::cursor`] before windowing. `predicate` restricts the
/// candidate set (e.g. "belongs to this workflow") prior to cursor
/// bounding and windowing.
pub fn paginate<T>(
    max_page_size: usize,
    records: impl IntoIterator<Item = T>,
    mut predicate: impl FnMut(&T) -> bool,
    args: PageArgs,
) -> Result<Page<T>, PageError>
where
    T: Identified,
{
    let opts = parse_page_opts(max_page_size, &args)?;

    let mut filtered: Vec<T> = records.into_iter().filter(|r| predicate(r)).collect();
    filtered.sort_by(|a, b| a.cursor().cmp(b.cursor()));

    if let Some(after) = &opts.after {
        filtered.retain(|r| r.cursor() > after.as_str());
    }
    if let Some(before) = &opts.before {
        filtered.retain(|r| r.cursor() < before.as_str());
    }

    let total_count = filtered.len();

    let (window, has_next_page, has_previous_page) = if opts.first > 0 {
        let has_next_page = filtered.len() > opts.first;
        filtered.truncate(opts.first);
        (filtered, has_next_page, false)
    } else if opts.last > 0 {
        let has_previous_page = filtered.len() > opts.last;
        let start = filtered.len().saturating_sub(opts.last);
        let window = filtered.split_off(start);
        (window, false, has_previous_page)
    } else {
        (filtered, false, false)
    };

    let start_cursor = window.first().map(|r| r.cursor().to_string());
    let end_cursor = window.last().map(|r| r.cursor().to_string());

    Ok(Page {
        items: window,
        page_info: PageInfo { start_cursor, end_cursor, has_next_page, has_previous_page },
        total_count,
    })
}
