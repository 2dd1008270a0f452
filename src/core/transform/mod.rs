//! Cleaning stage: a fixed, ordered list of column rules.
//!
//! Every rule rewrites its own columns and nothing else. A rule whose input
//! column is missing sees it as all nulls, so its defaults still apply.

pub mod rules;
pub mod text;

use std::collections::HashMap;

use tracing::{debug, info};

use crate::core::frame::MovieFrame;
use crate::utils::ReelResult;

use rules::{Rule, RuleContext};

const RULES: [(&str, Rule); 14] = [
    ("id", rules::clean_ids),
    ("title", rules::clean_titles),
    ("genres", rules::map_genres),
    ("release_date", rules::parse_release_dates),
    ("popularity", rules::clean_popularity),
    ("votes", rules::clean_votes),
    ("overview", rules::clean_overview),
    ("finances", rules::clean_finances),
    ("runtime", rules::clean_runtime),
    ("original_fields", rules::clean_original_fields),
    ("production_companies", rules::clean_production_companies),
    ("status", rules::clean_status),
    ("directors", rules::clean_directors),
    ("image_paths", rules::clean_image_paths),
];

pub fn transform(mut frame: MovieFrame, genres: &HashMap<i64, String>) -> ReelResult<MovieFrame> {
    let ctx = RuleContext { genres };
    let rows_in = frame.height();

    for (name, rule) in RULES.iter() {
        let before = frame.height();
        rule(&mut frame, &ctx)?;
        debug!(
            target: "reelpipe::transform",
            rule = name,
            rows_before = before,
            rows_after = frame.height(),
            "Applied column rule"
        );
    }

    info!(
        target: "reelpipe::transform",
        rows_in,
        rows_out = frame.height(),
        rules = RULES.len(),
        "Transformation finished"
    );
    Ok(frame)
}
