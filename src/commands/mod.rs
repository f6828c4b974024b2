pub mod check_ids;
pub mod entities;
pub mod fix_depth;
pub mod fix_xrefs;
pub mod front_matter;
pub mod migrate;
pub mod pdf_text;
pub mod reconcile;
pub mod report;
pub mod toc_levels;
pub mod toc_titles;
