//! Static provider catalog.
//!
//! Each provider offers a fixed set of carriers and spells them its own way
//! on the wire. Adding a provider means adding a variant here and a row in
//! [`PROVIDERS`].

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Phone-number rental services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Viotp,
    ChoThueSimCode,
    CodeSim,
    Otp365,
    FunOtp,
    IronSim,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::Viotp,
        Provider::ChoThueSimCode,
        Provider::CodeSim,
        Provider::Otp365,
        Provider::FunOtp,
        Provider::IronSim,
    ];

    /// Identifier used in API requests and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Viotp => "viotp",
            Provider::ChoThueSimCode => "chothuesimcode",
            Provider::CodeSim => "codesim",
            Provider::Otp365 => "otp365",
            Provider::FunOtp => "funotp",
            Provider::IronSim => "ironsim",
        }
    }

    /// Catalog entry for this provider.
    pub fn info(self) -> &'static ProviderInfo {
        // PROVIDERS is indexed in declaration order.
        &PROVIDERS[self as usize]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownProvider(s.to_string()))
    }
}

/// Mobile network operators a number can be requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
    /// Let the provider pick any available network.
    Random,
    Viettel,
    Mobifone,
    Vinaphone,
    Vietnamobile,
    Itelecom,
    Wintel,
}

impl Carrier {
    pub const ALL: [Carrier; 7] = [
        Carrier::Random,
        Carrier::Viettel,
        Carrier::Mobifone,
        Carrier::Vinaphone,
        Carrier::Vietnamobile,
        Carrier::Itelecom,
        Carrier::Wintel,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Carrier::Random => "random",
            Carrier::Viettel => "viettel",
            Carrier::Mobifone => "mobifone",
            Carrier::Vinaphone => "vinaphone",
            Carrier::Vietnamobile => "vietnamobile",
            Carrier::Itelecom => "itelecom",
            Carrier::Wintel => "wintel",
        }
    }
}

impl fmt::Display for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Carrier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Carrier::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ValidationError::UnknownCarrier(s.to_string()))
    }
}

/// A carrier as one provider spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierOption {
    pub carrier: Carrier,
    pub wire: &'static str,
}

const fn opt(carrier: Carrier, wire: &'static str) -> CarrierOption {
    CarrierOption { carrier, wire }
}

/// Catalog row for one provider.
#[derive(Debug)]
pub struct ProviderInfo {
    pub provider: Provider,
    pub display_name: &'static str,
    pub carriers: &'static [CarrierOption],
}

/// The provider catalog, in [`Provider`] declaration order.
pub static PROVIDERS: [ProviderInfo; 6] = [
    ProviderInfo {
        provider: Provider::Viotp,
        display_name: "VIOTP",
        carriers: &[
            opt(Carrier::Random, ""),
            opt(Carrier::Viettel, "Viettel"),
            opt(Carrier::Mobifone, "Mobifone"),
            opt(Carrier::Vinaphone, "Vinaphone"),
            opt(Carrier::Vietnamobile, "Vietnamobile"),
            opt(Carrier::Itelecom, "ITelecom"),
            opt(Carrier::Wintel, "Wintel"),
        ],
    },
    ProviderInfo {
        provider: Provider::ChoThueSimCode,
        display_name: "Cho Thue Sim Code",
        carriers: &[
            opt(Carrier::Random, ""),
            opt(Carrier::Viettel, "VIETTEL"),
            opt(Carrier::Mobifone, "MOBIFONE"),
            opt(Carrier::Vinaphone, "VINAPHONE"),
            opt(Carrier::Vietnamobile, "VNMB"),
        ],
    },
    ProviderInfo {
        provider: Provider::CodeSim,
        display_name: "CodeSim",
        carriers: &[
            opt(Carrier::Random, "0"),
            opt(Carrier::Viettel, "1"),
            opt(Carrier::Mobifone, "2"),
            opt(Carrier::Vinaphone, "3"),
            opt(Carrier::Vietnamobile, "4"),
        ],
    },
    ProviderInfo {
        provider: Provider::Otp365,
        display_name: "365OTP",
        carriers: &[
            opt(Carrier::Random, "random"),
            opt(Carrier::Viettel, "viettel"),
            opt(Carrier::Mobifone, "mobi"),
            opt(Carrier::Vinaphone, "vina"),
        ],
    },
    ProviderInfo {
        provider: Provider::FunOtp,
        display_name: "FunOTP",
        carriers: &[
            opt(Carrier::Random, "ANY"),
            opt(Carrier::Viettel, "VTT"),
            opt(Carrier::Mobifone, "VMS"),
            opt(Carrier::Vinaphone, "VNP"),
        ],
    },
    ProviderInfo {
        provider: Provider::IronSim,
        display_name: "IronSim",
        carriers: &[
            opt(Carrier::Random, "random"),
            opt(Carrier::Viettel, "viettel"),
            opt(Carrier::Mobifone, "mobifone"),
            opt(Carrier::Vinaphone, "vinaphone"),
            opt(Carrier::Vietnamobile, "vietnamobile"),
            opt(Carrier::Wintel, "wintel"),
        ],
    },
];

/// Carriers a provider offers, `Random` first.
pub fn carrier_options(provider: Provider) -> Vec<Carrier> {
    provider.info().carriers.iter().map(|o| o.carrier).collect()
}

/// Provider-specific spelling of a carrier, if the provider offers it.
pub fn wire_carrier(provider: Provider, carrier: Carrier) -> Option<&'static str> {
    provider
        .info()
        .carriers
        .iter()
        .find(|o| o.carrier == carrier)
        .map(|o| o.wire)
}

/// Validate a requested carrier against the catalog. No carrier means `Random`.
pub fn resolve_carrier(
    provider: Provider,
    carrier: Option<Carrier>,
) -> Result<Carrier, ValidationError> {
    let carrier = carrier.unwrap_or(Carrier::Random);
    match wire_carrier(provider, carrier) {
        Some(_) => Ok(carrier),
        None => Err(ValidationError::UnsupportedCarrier {
            provider: provider.to_string(),
            carrier: carrier.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_matches_variants() {
        for provider in Provider::ALL {
            assert_eq!(provider.info().provider, provider);
        }
    }

    #[test]
    fn test_every_provider_offers_random_first() {
        for provider in Provider::ALL {
            assert_eq!(carrier_options(provider).first(), Some(&Carrier::Random));
        }
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("viotp".parse::<Provider>(), Ok(Provider::Viotp));
        assert_eq!(" OTP365 ".parse::<Provider>(), Ok(Provider::Otp365));
        assert!(matches!(
            "nope".parse::<Provider>(),
            Err(ValidationError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_wire_carrier_is_provider_specific() {
        assert_eq!(wire_carrier(Provider::CodeSim, Carrier::Viettel), Some("1"));
        assert_eq!(wire_carrier(Provider::FunOtp, Carrier::Viettel), Some("VTT"));
        assert_eq!(wire_carrier(Provider::Otp365, Carrier::Wintel), None);
    }

    #[test]
    fn test_resolve_carrier() {
        assert_eq!(resolve_carrier(Provider::Viotp, None), Ok(Carrier::Random));
        assert_eq!(
            resolve_carrier(Provider::IronSim, Some(Carrier::Wintel)),
            Ok(Carrier::Wintel)
        );

        let err = resolve_carrier(Provider::FunOtp, Some(Carrier::Itelecom)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedCarrier {
                provider: "funotp".into(),
                carrier: "itelecom".into(),
            }
        );
    }

    #[test]
    fn test_provider_serialization() {
        let json = serde_json::to_string(&Provider::ChoThueSimCode).unwrap();
        assert_eq!(json, "\"chothuesimcode\"");

        let carrier: Carrier = serde_json::from_str("\"vietnamobile\"").unwrap();
        assert_eq!(carrier, Carrier::Vietnamobile);
    }
}
