//! Precomputed z-score quantile table.
//!
//! Entry `i` is the probability mass below `i / 50 * 7` standard deviations of
//! the committee-size distribution (a binomial with `n = 10^10`, `p = 10^-6`,
//! taken at its Poisson limit), scaled to the full `u64` range. Entry 0 is the
//! midpoint `2^63` and the last entry is `u64::MAX`, so every 64-bit VRF prefix
//! falls inside the table.

/// Number of quantile buckets.
pub const TABLE_SIZE: usize = 50;

/// Largest z-score the table spans.
pub const MAX_Z: u64 = 7;

/// Midpoint of the `u64` range; VRF prefixes below it land in the lower tail.
pub const MIDPOINT: u64 = 1 << 63;

/// Quantiles, strictly increasing.
pub static Z_TABLE: [u64; TABLE_SIZE] = [
    9_223_372_036_854_775_808,
    10_225_781_427_614_466_048,
    11_232_837_467_032_932_352,
    12_201_297_257_877_374_976,
    13_114_654_633_688_866_816,
    13_959_433_101_304_031_232,
    14_725_734_478_648_188_928,
    15_407_480_707_850_401_792,
    16_002_353_232_626_774_016,
    16_511_466_872_113_534_976,
    16_938_839_598_888_925_184,
    17_290_733_457_798_625_280,
    17_574_944_478_592_731_136,
    17_800_112_121_641_775_104,
    17_975_104_186_613_340_160,
    18_108_514_520_538_171_392,
    18_208_291_586_728_478_720,
    18_281_498_737_299_167_232,
    18_334_193_703_529_285_632,
    18_371_406_209_738_692_608,
    18_397_188_657_653_014_528,
    18_414_714_789_050_339_328,
    18_426_404_018_355_521_536,
    18_434_053_548_807_391_232,
    18_438_965_385_466_097_664,
    18_442_060_127_231_821_824,
    18_443_973_446_171_979_776,
    18_445_134_209_936_764_928,
    18_445_825_252_605_235_200,
    18_446_228_973_695_225_856,
    18_446_460_438_271_401_984,
    18_446_590_672_487_569_408,
    18_446_662_586_587_056_128,
    18_446_701_559_445_219_328,
    18_446_722_288_551_870_464,
    18_446_733_109_862_373_376,
    18_446_738_654_470_678_528,
    18_446_741_442_930_495_488,
    18_446_742_819_414_452_224,
    18_446_743_486_377_652_224,
    18_446_743_803_602_518_016,
    18_446_743_951_710_296_064,
    18_446_744_019_590_699_008,
    18_446_744_050_131_292_160,
    18_446_744_063_620_534_272,
    18_446_744_069_469_585_408,
    18_446_744_071_959_480_320,
    18_446_744_073_000_085_504,
    18_446_744_073_427_066_880,
    18_446_744_073_709_551_615,
];

/// Locate the bucket for a VRF prefix `q`.
///
/// Returns the bucket index and whether `q` sits in the lower tail. Upper-tail
/// prefixes take the first entry at or above `q`. Lower-tail prefixes are
/// mirrored around the midpoint and take the last entry at or below the
/// mirrored value.
pub fn z_index(q: u64) -> (usize, bool) {
    if q < MIDPOINT {
        let adjusted = MIDPOINT.saturating_add(MIDPOINT - q);
        let idx = Z_TABLE
            .iter()
            .rposition(|&entry| adjusted >= entry)
            .unwrap_or(0);
        (idx, true)
    } else {
        let idx = Z_TABLE
            .iter()
            .position(|&entry| q <= entry)
            .unwrap_or(TABLE_SIZE - 1);
        (idx, false)
    }
}

/// Fixed-point z-score (two implied decimals) for a bucket index.
pub fn z100(index: usize) -> u64 {
    index as u64 * MAX_Z * 100 / TABLE_SIZE as u64
}
