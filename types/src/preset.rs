#![allow(clippy::module_name_repetitions)]

use core::{fmt::Debug, hash::Hash};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use typenum::{NonZero, Unsigned, U32, U64, U8, U8192};

/// Compile-time chain parameters.
///
/// Only the parameters needed to lay out slots and the historical root vectors are included.
pub trait Preset: Copy + Eq + Ord + Hash + Default + Debug + Send + Sync + 'static {
    type SlotsPerEpoch: Unsigned + NonZero;
    type SlotsPerHistoricalRoot: Unsigned + NonZero;

    const NAME: PresetName;
}

/// [Mainnet preset](https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/presets/mainnet).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Mainnet;

impl Preset for Mainnet {
    type SlotsPerEpoch = U32;
    type SlotsPerHistoricalRoot = U8192;

    const NAME: PresetName = PresetName::Mainnet;
}

/// [Minimal preset](https://github.com/ethereum/consensus-specs/tree/aac851f860fa384916f62027b2dbe3318a354c5b/presets/minimal).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Debug)]
pub struct Minimal;

impl Preset for Minimal {
    type SlotsPerEpoch = U8;
    type SlotsPerHistoricalRoot = U64;

    const NAME: PresetName = PresetName::Minimal;
}

#[derive(
    Clone, Copy, PartialEq, Eq, Debug, Display, EnumString, Deserialize, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    Mainnet,
    Minimal,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(PresetName::Mainnet, "mainnet")]
    #[test_case(PresetName::Minimal, "minimal")]
    fn preset_name_round_trips_through_string(name: PresetName, string: &str) {
        assert_eq!(name.to_string(), string);
        assert_eq!(string.parse::<PresetName>(), Ok(name));
    }

    #[test]
    fn presets_have_expected_slot_layout() {
        assert_eq!(<Mainnet as Preset>::SlotsPerEpoch::U64, 32);
        assert_eq!(<Mainnet as Preset>::SlotsPerHistoricalRoot::U64, 8192);
        assert_eq!(<Minimal as Preset>::SlotsPerEpoch::U64, 8);
        assert_eq!(<Minimal as Preset>::SlotsPerHistoricalRoot::U64, 64);
    }
}
