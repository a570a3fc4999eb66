//! Retypes text as if it had been entered with the other keyboard layout
//! (US QWERTY <-> Russian JCUKEN), key by key.

use std::collections::HashMap;

// Same physical key, same position in both strings.
const EN_KEYS: &str = "`qwertyuiop[]asdfghjkl;'zxcvbnm,./~QWERTYUIOP{}ASDFGHJKL:\"ZXCVBNM<>?@#$^&|";
const RU_KEYS: &str = "ёйцукенгшщзхъфывапролджэячсмитьбю.ЁЙЦУКЕНГШЩЗХЪФЫВАПРОЛДЖЭЯЧСМИТЬБЮ,\"№;:?/";

lazy_static::lazy_static! {
    static ref EN_TO_RU: HashMap<char, char> = EN_KEYS.chars().zip(RU_KEYS.chars()).collect();
    static ref RU_TO_EN: HashMap<char, char> = RU_KEYS.chars().zip(EN_KEYS.chars()).collect();
}

/// A character found on both sides is treated as Latin: `.` becomes `ю`
/// even though `.` is also the Russian character on the `/` key.
/// Unmapped characters are kept as is.
pub fn swap_layout(text: &str) -> String {
    text.chars()
        .map(|c| {
            EN_TO_RU
                .get(&c)
                .or_else(|| RU_TO_EN.get(&c))
                .copied()
                .unwrap_or(c)
        })
        .collect()
}
