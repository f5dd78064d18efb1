//! Contract point values by root symbol.

/// Dollar value of a one-point move for one contract, keyed by root.
/// Sorted by root for binary search.
const CONTRACT_SIZES: &[(&str, f64)] = &[
    ("/6A", 100_000.0),
    ("/6B", 62_500.0),
    ("/6C", 100_000.0),
    ("/6E", 125_000.0),
    ("/6J", 12_500_000.0),
    ("/CL", 1_000.0),
    ("/ES", 50.0),
    ("/GC", 100.0),
    ("/HG", 25_000.0),
    ("/M2K", 5.0),
    ("/MCL", 100.0),
    ("/MES", 5.0),
    ("/MGC", 10.0),
    ("/MNQ", 2.0),
    ("/MYM", 0.5),
    ("/NG", 10_000.0),
    ("/NQ", 20.0),
    ("/RTY", 50.0),
    ("/SI", 5_000.0),
    ("/SIL", 1_000.0),
    ("/YM", 5.0),
    ("/ZB", 1_000.0),
    ("/ZC", 50.0),
    ("/ZF", 1_000.0),
    ("/ZN", 1_000.0),
    ("/ZS", 50.0),
    ("/ZT", 2_000.0),
    ("/ZW", 50.0),
];

/// Fallback when neither the table nor the position knows the point value
pub const DEFAULT_CONTRACT_SIZE: f64 = 1.0;

/// Static point value for a root, if tabulated.
pub fn tabulated_size(root: &str) -> Option<f64> {
    CONTRACT_SIZES
        .binary_search_by(|(r, _)| (*r).cmp(root))
        .ok()
        .map(|i| CONTRACT_SIZES[i].1)
}

/// Point value for a root: table first, then the position's own multiplier, then 1.
pub fn size_of(root: &str, position_multiplier: Option<f64>) -> f64 {
    tabulated_size(root)
        .or_else(|| position_multiplier.filter(|m| m.is_finite() && *m > 0.0))
        .unwrap_or(DEFAULT_CONTRACT_SIZE)
}
