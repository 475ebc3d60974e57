//! IMAP command handlers for the fake server, one module per command
//! (LOGIN, SELECT, SEARCH, FETCH, STORE, CLOSE, LOGOUT).

mod close;
mod login;
mod search;
mod select;

pub use close::handle_close;
pub use fetch::handle_fetch;
pub use login::handle_login;
pub use logout::handle_logout;
pub use search::handle_search;
pub use select::handle_select;
pub use store::{StoreArgs, handle_store};

use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};

/// Expand a sequence set into sequence numbers. `*` stands for `max`.
fn sequence_numbers(set: &SequenceSet, max: u32) -> Vec<u32> {
    let value = |s: &SeqOrUid| match s {
        SeqOrUid::Value(v) => v.get(),
        SeqOrUid::Asterisk => max,
    };

    let mut seqs = Vec::new();
    for seq in set.0.as_ref() {
        match seq {
            Sequence::Single(s) => seqs.push(value(s)),
            Sequence::Range(a, b) => {
                let (lo, hi) = (value(a).min(value(b)), value(a).max(value(b)));
                seqs.extend(lo..=hi);
            }
        }
    }
    seqs.retain(|&n| n > 0);
    seqs
}
