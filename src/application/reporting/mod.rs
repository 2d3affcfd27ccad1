pub mod formatter;

pub use formatter::{
    format_approvals, format_cycle_summary, format_decision_result, format_portfolio_status,
};
