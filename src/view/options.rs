use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortKey {
    /// Leave the incoming order untouched.
    #[default]
    None,
    Pid,
    ProgramName,
    User,
    Cpu,
    Mem,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::None,
        SortKey::Pid,
        SortKey::ProgramName,
        SortKey::User,
        SortKey::Cpu,
        SortKey::Mem,
    ];

    pub fn next(self) -> Self {
        match self {
            SortKey::None => SortKey::Pid,
            SortKey::Pid => SortKey::ProgramName,
            SortKey::ProgramName => SortKey::User,
            SortKey::User => SortKey::Cpu,
            SortKey::Cpu => SortKey::Mem,
            SortKey::Mem => SortKey::None,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            SortKey::None => SortKey::Mem,
            SortKey::Pid => SortKey::None,
            SortKey::ProgramName => SortKey::Pid,
            SortKey::User => SortKey::ProgramName,
            SortKey::Cpu => SortKey::User,
            SortKey::Mem => SortKey::Cpu,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::None => "none",
            SortKey::Pid => "pid",
            SortKey::ProgramName => "name",
            SortKey::User => "user",
            SortKey::Cpu => "cpu",
            SortKey::Mem => "mem",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(SortKey::None),
            "pid" => Ok(SortKey::Pid),
            "name" | "program" => Ok(SortKey::ProgramName),
            "user" => Ok(SortKey::User),
            "cpu" => Ok(SortKey::Cpu),
            "mem" | "memory" => Ok(SortKey::Mem),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortOrder {
    #[default]
    None,
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn toggle(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::None | SortOrder::Descending => SortOrder::Ascending,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::None => "none",
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(SortOrder::None),
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ViewOptions {
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
}

impl ViewOptions {
    pub fn new(sort_key: SortKey, sort_order: SortOrder) -> Self {
        let mut options = Self {
            sort_key,
            sort_order,
        };
        options.default_order();
        options
    }

    pub fn set_key(&mut self, key: SortKey) {
        self.sort_key = key;
        self.default_order();
    }

    pub fn set_order(&mut self, order: SortOrder) {
        self.sort_order = order;
        self.default_order();
    }

    /// A real key with no order sorts ascending.
    fn default_order(&mut self) {
        if self.sort_key != SortKey::None && self.sort_order == SortOrder::None {
            self.sort_order = SortOrder::Ascending;
        }
    }
}

/// View-option change requested by the presentation layer.
///
/// Set requests carry the raw value as typed or configured; it is validated
/// when applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    SetSortKey(String),
    SetSortOrder(String),
    NextSortKey,
    PreviousSortKey,
    ToggleSortOrder,
}

impl ViewAction {
    pub fn sort_by(key: SortKey) -> Self {
        ViewAction::SetSortKey(key.label().to_string())
    }

    pub fn order(order: SortOrder) -> Self {
        ViewAction::SetSortOrder(order.label().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_and_previous_visit_every_key() {
        let mut key = SortKey::None;
        for expected in SortKey::ALL.iter().skip(1).chain(std::iter::once(&SortKey::None)) {
            key = key.next();
            assert_eq!(key, *expected);
        }
        for k in SortKey::ALL {
            assert_eq!(k.next().previous(), k);
        }
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for k in SortKey::ALL {
            assert_eq!(k.label().parse::<SortKey>(), Ok(k));
        }
        for o in [SortOrder::None, SortOrder::Ascending, SortOrder::Descending] {
            assert_eq!(o.label().parse::<SortOrder>(), Ok(o));
        }
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!("size".parse::<SortKey>().is_err());
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn setting_key_defaults_order_to_ascending() {
        let mut options = ViewOptions::default();
        options.set_key(SortKey::Cpu);
        assert_eq!(options.sort_order, SortOrder::Ascending);

        options.set_order(SortOrder::Descending);
        options.set_key(SortKey::Mem);
        assert_eq!(options.sort_order, SortOrder::Descending);
    }

    #[test]
    fn clearing_order_with_key_set_keeps_sorting() {
        let mut options = ViewOptions::new(SortKey::Cpu, SortOrder::Descending);
        options.set_order(SortOrder::None);
        assert_eq!(options.sort_order, SortOrder::Ascending);

        let mut unsorted = ViewOptions::default();
        unsorted.set_order(SortOrder::None);
        assert_eq!(unsorted.sort_order, SortOrder::None);
    }

    #[test]
    fn toggle_order() {
        assert_eq!(SortOrder::None.toggle(), SortOrder::Ascending);
        assert_eq!(SortOrder::Ascending.toggle(), SortOrder::Descending);
        assert_eq!(SortOrder::Descending.toggle(), SortOrder::Ascending);
    }
}
