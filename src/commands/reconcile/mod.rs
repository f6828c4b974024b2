use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use crate::cli::{MatchArgs, ReconcileIdsArgs};
use crate::commands::report::{self, CommandLine};
use crate::ident::IdScheme;
use crate::markup::{AttrRewriter, IdFinder, TitledElement, TitledElementFinder, apply_edits};
use crate::model::StepSummary;
use crate::toc::{OutlineScanner, TitleIndex, TitleIndexEntry};
use crate::workspace::Workspace;

mod matching;
mod run;
#[cfg(test)]
mod tests;

pub use run::{apply, run};

use matching::*;

pub const STEP: &str = "reconcile-ids";
