//! SharePoint internal field name escaping.
//!
//! Internal names replace spaces and Turkish letters with `_xHHHH_` sequences, so
//! a column shown as "Ürün Adı" is addressed as `_x00dc_r_x00fc_n_x0020_Ad_x0131_`.

const ESCAPES: &[(char, &str)] = &[
    (' ', "_x0020_"),
    ('ü', "_x00fc_"),
    ('ş', "_x015f_"),
    ('ı', "_x0131_"),
    ('ö', "_x00f6_"),
    ('ç', "_x00e7_"),
    ('ğ', "_x011f_"),
    ('Ü', "_x00dc_"),
    ('Ş', "_x015e_"),
    ('İ', "_x0130_"),
    ('Ö', "_x00d6_"),
    ('Ç', "_x00c7_"),
    ('Ğ', "_x011e_"),
];

/// Length of an `_xHHHH_` escape.
const ESCAPE_LEN: usize = 7;

/// Display name to internal name.
pub fn encode_field_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for c in name.chars() {
        match ESCAPES.iter().find(|(raw, _)| *raw == c) {
            Some((_, escape)) => encoded.push_str(escape),
            None => encoded.push(c),
        }
    }
    encoded
}

/// Internal name to display name. Unknown escapes are left as they are.
pub fn decode_field_name(name: &str) -> String {
    let mut decoded = String::with_capacity(name.len());
    let mut rest = name;

    while let Some(pos) = rest.find("_x") {
        decoded.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let known = tail
            .get(..ESCAPE_LEN)
            .and_then(|candidate| ESCAPES.iter().find(|(_, escape)| *escape == candidate));

        match known {
            Some((raw, _)) => {
                decoded.push(*raw);
                rest = &tail[ESCAPE_LEN..];
            }
            None => {
                decoded.push_str("_x");
                rest = &tail[2..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}
