//! Number formatting for result bundles

use crate::constants::stats::P_VALUE_FLOOR;

/// "< 0.001" below the floor, otherwise three decimals
pub fn format_p_value(p: f64) -> String {
    if p < P_VALUE_FLOOR {
        "< 0.001".to_string()
    } else {
        format!("{:.3}", p)
    }
}

/// Two decimals; undefined values render as "n/a"
pub fn fixed2(value: f64) -> String {
    fixed(value, 2)
}

/// Three decimals; undefined values render as "n/a"
pub fn fixed3(value: f64) -> String {
    fixed(value, 3)
}

fn fixed(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", decimals, value)
    } else {
        "n/a".to_string()
    }
}

/// Percentage with two decimals and a trailing `%`
pub fn percent2(value: f64) -> String {
    format!("{}%", fixed2(value))
}
