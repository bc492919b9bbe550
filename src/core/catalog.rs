use std::collections::HashMap;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::core::bucket::BucketStore;
use crate::core::identity::KeyScheme;
use crate::models::{MovieRecord, MpaaRating};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeBand {
    NinetyOrLess,
    OneTwentyOrLess,
    OneEightyOrMore,
    TwoFortyOrMore,
}

impl RuntimeBand {
    pub const ALL: [RuntimeBand; 4] = [
        RuntimeBand::NinetyOrLess,
        RuntimeBand::OneTwentyOrLess,
        RuntimeBand::OneEightyOrMore,
        RuntimeBand::TwoFortyOrMore,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RuntimeBand::NinetyOrLess => "90_Minutes_or_Less",
            RuntimeBand::OneTwentyOrLess => "120_Minutes_or_Less",
            RuntimeBand::OneEightyOrMore => "180_Minutes_or_Greater",
            RuntimeBand::TwoFortyOrMore => "240_Minutes_or_Greater",
        }
    }

    pub fn contains(&self, minutes: u32) -> bool {
        match self {
            RuntimeBand::NinetyOrLess => minutes <= 90,
            RuntimeBand::OneTwentyOrLess => minutes <= 120,
            RuntimeBand::OneEightyOrMore => minutes >= 180,
            RuntimeBand::TwoFortyOrMore => minutes >= 240,
        }
    }

    /// Every band a runtime falls into; bands overlap.
    pub fn matching(minutes: u32) -> Vec<RuntimeBand> {
        Self::ALL.into_iter().filter(|b| b.contains(minutes)).collect()
    }
}

/// Continents in lookup order. A country listed under two continents
/// (Russia, Turkey, ...) belongs to the first one.
pub const CONTINENTS: [(&str, &[&str]); 6] = [
    ("Africa", &[
        "Ivory Coast", "Algeria", "Angola", "Benin", "Botswana", "Burkina Faso", "Burundi",
        "Cabo Verde", "Cameroon", "Central African Republic", "Chad", "Comoros",
        "Congo, Democratic Republic of the", "Congo, Republic of the", "Djibouti", "Egypt",
        "Equatorial Guinea", "Eritrea", "Eswatini", "Ethiopia", "Gabon", "Gambia", "Ghana",
        "Guinea", "Guinea-Bissau", "Kenya", "Lesotho", "Liberia", "Libya", "Madagascar",
        "Malawi", "Mali", "Mauritania", "Mauritius", "Morocco", "Mozambique", "Namibia",
        "Niger", "Nigeria", "Rwanda", "Sao Tome and Principe", "Senegal", "Seychelles",
        "Sierra Leone", "Somalia", "South Africa", "South Sudan", "Sudan", "Tanzania", "Togo",
        "Tunisia", "Uganda", "Zambia", "Zimbabwe", "Congo",
    ]),
    ("Asia", &[
        "State of Palestine", "Hong Kong", "Afghanistan", "Armenia", "Azerbaijan", "Bahrain",
        "Bangladesh", "Bhutan", "Brunei", "Cambodia", "China", "Cyprus", "Georgia", "India",
        "Indonesia", "Iran", "Iraq", "Israel", "Japan", "Jordan", "Kazakhstan", "Kuwait",
        "Kyrgyzstan", "Laos", "Lebanon", "Malaysia", "Maldives", "Mongolia", "Myanmar", "Nepal",
        "North Korea", "Oman", "Pakistan", "Palestine", "Philippines", "Qatar", "Russia",
        "Saudi Arabia", "Singapore", "South Korea", "Sri Lanka", "Syrian Arab Republic",
        "Taiwan", "Tajikistan", "Thailand", "Timor-Leste", "Turkey", "Turkmenistan",
        "United Arab Emirates", "Uzbekistan", "Vietnam", "Yemen", "Syria",
    ]),
    ("Europe", &[
        "East Germany", "North Macedonia", "Yugoslavia", "Serbia and Montenegro",
        "Czechoslovakia", "Czechia", "USSR", "Albania", "Latvia", "Andorra", "Liechtenstein",
        "Lithuania", "Austria", "Luxembourg", "Malta", "Belarus", "Moldova", "Belgium", "Monaco",
        "Bosnia and Herzegovina", "Montenegro", "Bulgaria", "Netherlands", "Croatia", "Norway",
        "Poland", "Czech Republic", "Portugal", "Denmark", "Romania", "Estonia", "Finland",
        "San Marino", "Former Yugoslav Republic of Macedonia", "Serbia", "France", "Slovakia",
        "Slovenia", "Germany", "Spain", "Greece", "Sweden", "Hungary", "Switzerland", "Iceland",
        "Ireland", "Italy", "Ukraine", "Kosovo", "UK",
    ]),
    ("North America", &[
        "Bahamas", "Guadeloupe", "Cuba", "The Bahamas", "Bermuda", "Canada", "The Caribbean",
        "Clipperton Island", "Greenland", "Mexico", "Saint Pierre and Miquelon",
        "Turks and Caicos Islands", "USA", "Belize", "Costa Rica", "El Salvador", "Guatemala",
        "Honduras", "Nicaragua", "Panama", "Dominican Republic", "Haiti", "Jamaica",
        "Martinique", "Netherlands Antilles", "Puerto Rico",
    ]),
    ("Oceania", &[
        "Australia", "Fiji", "Kiribati", "Marshall Islands", "Micronesia", "Nauru",
        "New Zealand", "Palau", "Papua New Guinea", "Samoa", "Solomon Islands", "Tonga",
        "Tuvalu", "Vanuatu", "French Polynesia",
    ]),
    ("South America", &[
        "Argentina", "Bolivia", "Brazil", "Chile", "Colombia", "Ecuador", "Guyana", "Paraguay",
        "Peru", "Suriname", "Uruguay", "Bolivarian Republic of Venezuela",
        "The Falkland Islands", "South Georgia and the South Sandwich Islands", "French Guiana",
        "Venezuela",
    ]),
];

pub fn continent_for(country: &str) -> Option<&'static str> {
    let needle = country.trim();
    CONTINENTS
        .iter()
        .find(|(_, countries)| countries.iter().any(|c| c.eq_ignore_ascii_case(needle)))
        .map(|(continent, _)| *continent)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketGroup {
    Main,
    Mpaa,
    Runtime,
    Continent,
}

impl fmt::Display for BucketGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BucketGroup::Main => "MAIN",
            BucketGroup::Mpaa => "MPAA RATING",
            BucketGroup::Runtime => "RUNTIME CATEGORY",
            BucketGroup::Continent => "CONTINENT",
        };
        f.write_str(s)
    }
}

/// Caps per bucket family, with per-bucket overrides keyed by bucket name.
#[derive(Debug, Clone)]
pub struct CapTable {
    pub main: usize,
    pub mpaa: usize,
    pub runtime: usize,
    pub continent: usize,
    pub overrides: HashMap<String, usize>,
}

impl CapTable {
    fn cap_for(&self, group: BucketGroup, name: &str) -> usize {
        // Config keys may come back lowercased.
        if let Some((_, cap)) = self
            .overrides
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
        {
            return *cap;
        }
        match group {
            BucketGroup::Main => self.main,
            BucketGroup::Mpaa => self.mpaa,
            BucketGroup::Runtime => self.runtime,
            BucketGroup::Continent => self.continent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnmappedSighting {
    pub title: String,
    pub year: String,
    pub url: Option<String>,
}

/// Which buckets took a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    pub main: bool,
    pub extra: Vec<String>,
}

/// Every bucket of one run. Created at run start and handed through the
/// pipeline; nothing here lives beyond the run.
#[derive(Debug)]
pub struct Catalog {
    main: BucketStore,
    mpaa: IndexMap<MpaaRating, BucketStore>,
    runtime: IndexMap<RuntimeBand, BucketStore>,
    continents: IndexMap<&'static str, BucketStore>,
    unmapped: IndexMap<String, UnmappedSighting>,
}

impl Catalog {
    pub fn new(main_name: &str, caps: &CapTable, scheme: KeyScheme) -> Self {
        let bucket = |group: BucketGroup, name: &str| {
            BucketStore::new(name, caps.cap_for(group, name), scheme)
        };
        Self {
            main: bucket(BucketGroup::Main, main_name),
            mpaa: MpaaRating::BUCKETED
                .into_iter()
                .map(|r| (r, bucket(BucketGroup::Mpaa, r.as_str())))
                .collect(),
            runtime: RuntimeBand::ALL
                .into_iter()
                .map(|b| (b, bucket(BucketGroup::Runtime, b.name())))
                .collect(),
            continents: CONTINENTS
                .iter()
                .map(|(c, _)| (*c, bucket(BucketGroup::Continent, *c)))
                .collect(),
            unmapped: IndexMap::new(),
        }
    }

    pub fn main(&self) -> &BucketStore {
        &self.main
    }

    pub fn accepted(&self) -> usize {
        self.main.len()
    }

    /// Offer an accepted record to every bucket it qualifies for.
    pub fn apply(&mut self, record: &MovieRecord) -> Placement {
        let mut placement = Placement {
            main: self.main.add(record.clone()),
            extra: Vec::new(),
        };

        if let Some(rating) = record.mpaa_rating.filter(|r| r.is_rated()) {
            if let Some(bucket) = self.mpaa.get_mut(&rating) {
                if bucket.add(record.clone()) {
                    placement.extra.push(bucket.name().to_string());
                }
            }
        }

        if let Some(minutes) = record.runtime_minutes {
            for band in RuntimeBand::matching(minutes) {
                if let Some(bucket) = self.runtime.get_mut(&band) {
                    if bucket.add(record.clone()) {
                        placement.extra.push(bucket.name().to_string());
                    }
                }
            }
        }

        let mut continents: IndexSet<&'static str> = IndexSet::new();
        for country in &record.countries {
            match continent_for(country) {
                Some(continent) => {
                    continents.insert(continent);
                }
                None => {
                    debug!(target: "letterboxd_buckets::catalog", country = %country, film = %record.display_name(), "Unmapped country");
                    self.unmapped
                        .entry(country.clone())
                        .or_insert_with(|| UnmappedSighting {
                            title: record.title.clone(),
                            year: record.year.clone(),
                            url: record.source_url.clone(),
                        });
                }
            }
        }
        for continent in continents {
            if let Some(bucket) = self.continents.get_mut(continent) {
                if bucket.add(record.clone()) {
                    placement.extra.push(bucket.name().to_string());
                }
            }
        }

        placement
    }

    /// All buckets with their family, main bucket first.
    pub fn buckets(&self) -> Vec<(BucketGroup, &BucketStore)> {
        let mut out = vec![(BucketGroup::Main, &self.main)];
        out.extend(self.mpaa.values().map(|b| (BucketGroup::Mpaa, b)));
        out.extend(self.runtime.values().map(|b| (BucketGroup::Runtime, b)));
        out.extend(self.continents.values().map(|b| (BucketGroup::Continent, b)));
        out
    }

    pub fn unmapped_countries(&self) -> &IndexMap<String, UnmappedSighting> {
        &self.unmapped
    }
}
