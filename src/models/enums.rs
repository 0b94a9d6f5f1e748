use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    Arrived => "arrived",
    InService => "in_service",
    Completed => "completed",
    NoShow => "no_show",
    Canceled => "canceled",
});

impl AppointmentStatus {
    /// Statuses that hold a slot on the professional's calendar.
    pub const ACTIVE: [AppointmentStatus; 4] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Arrived,
        AppointmentStatus::InService,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::NoShow | AppointmentStatus::Canceled
        )
    }
}

str_enum!(CommissionStatus {
    Pending => "pending",
    Paid => "paid",
});

str_enum!(CommissionKind {
    Accrual => "accrual",
    Adjustment => "adjustment",
});

str_enum!(StockMovementReason {
    ManualAdjustment => "manual_adjustment",
    Restock => "restock",
    Fulfillment => "fulfillment",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn appointment_status_round_trip() {
        for (variant, s) in [
            (AppointmentStatus::Scheduled, "scheduled"),
            (AppointmentStatus::Confirmed, "confirmed"),
            (AppointmentStatus::Arrived, "arrived"),
            (AppointmentStatus::InService, "in_service"),
            (AppointmentStatus::Completed, "completed"),
            (AppointmentStatus::NoShow, "no_show"),
            (AppointmentStatus::Canceled, "canceled"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AppointmentStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn serde_name_matches_storage_name() {
        let json = serde_json::to_string(&AppointmentStatus::InService).unwrap();
        assert_eq!(json, "\"in_service\"");
        let json = serde_json::to_string(&StockMovementReason::ManualAdjustment).unwrap();
        assert_eq!(json, "\"manual_adjustment\"");
    }

    #[test]
    fn terminal_and_active_sets_are_disjoint() {
        for status in AppointmentStatus::ACTIVE {
            assert!(!status.is_terminal());
        }
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::NoShow.is_terminal());
        assert!(AppointmentStatus::Canceled.is_terminal());
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(AppointmentStatus::from_str("done").is_err());
        assert!(CommissionStatus::from_str("").is_err());
    }
}
