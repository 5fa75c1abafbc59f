use phf::phf_map;

/// ISO 3166 alpha-2 codes for the countries a usage pattern may bind to.
static COUNTRIES: phf::Map<&'static str, &'static str> = phf_map! {
    "AR" => "Argentina", "AT" => "Austria", "AU" => "Australia", "BE" => "Belgium",
    "BG" => "Bulgaria", "BR" => "Brazil", "CA" => "Canada", "CH" => "Switzerland",
    "CL" => "Chile", "CN" => "China", "CO" => "Colombia", "CZ" => "Czechia",
    "DE" => "Germany", "DK" => "Denmark", "EE" => "Estonia", "EG" => "Egypt",
    "ES" => "Spain", "FI" => "Finland", "FR" => "France", "GB" => "United Kingdom",
    "GR" => "Greece", "HR" => "Croatia", "HU" => "Hungary", "ID" => "Indonesia",
    "IE" => "Ireland", "IL" => "Israel", "IN" => "India", "IT" => "Italy",
    "JP" => "Japan", "KE" => "Kenya", "KR" => "South Korea", "LT" => "Lithuania",
    "LU" => "Luxembourg", "LV" => "Latvia", "MA" => "Morocco", "MT" => "Malta",
    "MX" => "Mexico", "MY" => "Malaysia", "NG" => "Nigeria", "NL" => "Netherlands",
    "NO" => "Norway", "NZ" => "New Zealand", "PE" => "Peru", "PH" => "Philippines",
    "PL" => "Poland", "PT" => "Portugal", "RO" => "Romania", "RS" => "Serbia",
    "SA" => "Saudi Arabia", "SE" => "Sweden", "SG" => "Singapore", "SI" => "Slovenia",
    "SK" => "Slovakia", "TH" => "Thailand", "TN" => "Tunisia", "TR" => "Turkey",
    "TW" => "Taiwan", "UA" => "Ukraine", "US" => "United States", "UY" => "Uruguay",
    "VN" => "Vietnam", "ZA" => "South Africa",
};

pub fn valid_region_code(code: &str) -> bool {
    COUNTRIES.contains_key(code)
}

pub fn country_name(code: &str) -> Option<&'static str> {
    COUNTRIES.get(code).copied()
}
