//! Core A: the KV1 "Dienstregeling" (timetable) ingest pipeline.
//!
//! Text flows through [`lexer`] into tokens, through [`parser`] into typed
//! [`types::Kv1Records`], gets indexed by composite key in [`index`], and
//! finally cross-linked so every record can reach its referents.

pub mod index;
pub mod lexer;
pub mod parser;
pub mod types;

pub use index::{link_records, Kv1Index};
pub use types::Kv1Records;

#[cfg(test)]
pub(crate) mod testutil {
    use super::types::Kv1Records;
    use super::{lexer, parser};

    /// One row of every record type, forming a small consistent network:
    /// line M300 with journey pattern 1001 over stops 10001 -> 10002 ->
    /// 10003, links of 500 m and 700 m, and public journey 2045.
    pub fn fixture() -> Kv1Records {
        let rows: Vec<Vec<&str>> = vec![
            vec!["ORUN", "CXX", "U1", "Unit one", "PT", ""],
            vec!["ORUN", "CXX", "U2", "Unit two", "PT", ""],
            vec!["ORUNORUN", "CXX", "U1", "U2", "2024-01-01"],
            vec!["USRSTAR", "CXX", "UT001", "Centrum", "Utrecht", "", "", ""],
            vec!["POINT", "CXX", "10001", "", "SP", "RD", "137000", "455000", "", ""],
            vec!["POINT", "CXX", "10002", "", "SP", "RD", "137500", "455400", "", ""],
            vec!["POINT", "CXX", "10003", "", "SP", "RD", "138000", "455800", "", ""],
            vec![
                "USRSTOP", "CXX", "10001", "10001", "1", "1", "", "Stop A", "Utrecht", "UT001",
                "-", "", "", "0", "", "", "PASSENGER", "",
            ],
            vec![
                "USRSTOP", "CXX", "10002", "10002", "1", "1", "", "Stop B", "Utrecht", "", "-",
                "", "", "0", "", "", "PASSENGER", "",
            ],
            vec![
                "USRSTOP", "CXX", "10003", "10003", "1", "1", "", "Stop C", "Utrecht", "", "-",
                "", "", "0", "", "", "PASSENGER", "",
            ],
            vec!["TILI", "CXX", "10001", "10002", "", ""],
            vec!["LINK", "CXX", "10001", "10002", "", "500", "", "BUS"],
            vec!["LINK", "CXX", "10002", "10003", "", "700", "", "BUS"],
            vec!["LINE", "CXX", "M300", "300", "Ringlijn", "0", "", "BUS", "1", "", ""],
            vec![
                "DEST", "CXX", "D1", "Centraal", "Centraal", "", "0", "Centraal", "", "Centraal",
                "", "Centraal", "", "", "", "",
            ],
            vec!["JOPA", "CXX", "M300", "1001", "NORMAL", "1", ""],
            vec!["CONAREA", "CXX", "CA1", "Concessie Utrecht"],
            vec!["FINANCER", "CXX", "F1", "Provincie"],
            vec!["CONFINREL", "CXX", "CFR1", "CA1", "F1"],
            vec![
                "JOPATILI", "CXX", "M300", "1001", "1", "10001", "10002", "CFR1", "D1", "", "1",
                "", "", "1", "1", "", "1", "", "",
            ],
            vec![
                "JOPATILI", "CXX", "M300", "1001", "2", "10002", "10003", "CFR1", "D1", "", "0",
                "", "", "1", "1", "", "", "", "",
            ],
            vec![
                "POOL", "CXX", "10001", "10002", "", "CXX", "10001", "0", "", "", "", "BUS",
            ],
            vec!["ICON", "CXX", "1", "https://example.com/icon.png"],
            vec!["NOTICE", "CXX", "N1", "Rijdt niet op feestdagen"],
            vec![
                "NTCASSGNM", "CXX", "N1", "LINE", "", "", "", "", "", "", "", "M300", "", "", "",
                "", "",
            ],
            vec!["TIMDEMGRP", "CXX", "M300", "1001", "TDG1"],
            vec![
                "TIMDEMRNT", "CXX", "M300", "1001", "TDG1", "1", "10001", "10002", "120", "100",
                "", "", "20", "",
            ],
            vec!["PEGR", "CXX", "PG1", ""],
            vec!["SPECDAY", "CXX", "NORMAL", "Normale dag", ""],
            vec![
                "TIVE", "CXX", "U1", "TV1", "PG1", "NORMAL", "2024-01-01", "PUBT", "", "",
            ],
            vec![
                "PUJO", "CXX", "TV1", "U1", "PG1", "NORMAL", "1234567", "M300", "2045", "TDG1",
                "1001", "08:00:00", "ACCESSIBLE", "1", "1", "", "",
            ],
            vec!["PEGRVAL", "CXX", "U1", "PG1", "2024-01-01", "2024-06-30"],
            vec![
                "EXCOPDAY", "CXX", "U1", "2024-03-29T00:00:00", "1234500", "NORMAL", "", "",
            ],
            vec![
                "SCHEDVERS", "CXX", "U1", "S1", "WORKDAY", "2024-01-01", "", "",
            ],
            vec![
                "PUJOPASS", "CXX", "U1", "S1", "WORKDAY", "M300", "2045", "1", "1001", "10001",
                "", "08:00:00", "UNKNOWN", "1", "1", "", "",
            ],
            vec!["OPERDAY", "CXX", "U1", "S1", "WORKDAY", "2024-01-02", ""],
        ];

        let mut text = String::new();
        for row in rows {
            text.push_str(row[0]);
            text.push_str("|1|I|");
            text.push_str(&row[1..].join("|"));
            text.push('\n');
        }

        let (tokens, lex_errors) = lexer::lex(text.as_bytes());
        assert!(lex_errors.is_empty(), "{lex_errors:?}");
        let out = parser::parse(&tokens);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        out.records
    }
}
