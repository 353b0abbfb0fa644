pub mod time;

use nanoid::nanoid;

const ID_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Generate a url-safe lowercase id for sessions and messages.
pub fn longid() -> String {
    nanoid!(21, &ID_ALPHABET)
}

/// Short id for transcript entries.
pub fn shortid() -> String {
    nanoid!(8, &ID_ALPHABET)
}
