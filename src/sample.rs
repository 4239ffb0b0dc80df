//! Static onboarding templates reproducing the two-day worked example.

const RECORD_ORIENTED: &str = "\
Date,Name,Role,Attendance,Pool,Value
05/08,Kitchen,Kitchen,Yes,1000,
05/08,Juan,FOH,Yes,,12
05/08,Alina,FOH,Yes,,8
05/08,Ryu,FOH,No,,10
06/08,Kitchen,Kitchen,Yes,1200,
06/08,Juan,FOH,No,,10
06/08,Alina,FOH,Yes,,16
06/08,Ryu,FOH,Yes,,12
";

const WIDE_FORMAT: &str = "\
Name,05/08,06/08
Kitchen,Yes,Yes
Juan,Yes,No
Alina,Yes,Yes
Ryu,No,Yes
";

const WEIGHTS: &str = "\
Name,05/08,06/08
Kitchen,,
Juan,12,10
Alina,8,16
Ryu,10,12
";

/// One row per person per date, with the pool on the kitchen row.
pub fn record_oriented_csv() -> &'static str {
    RECORD_ORIENTED
}

/// The same roster as a person-by-date cross-tab.
pub fn wide_format_csv() -> &'static str {
    WIDE_FORMAT
}

/// Performance values matching [`wide_format_csv`].
pub fn weights_csv() -> &'static str {
    WEIGHTS
}

/// Pools for the cross-tab sample, which carries none itself.
pub fn sample_pools() -> [(&'static str, f64); 2] {
    [("05/08", 1000.0), ("06/08", 1200.0)]
}
