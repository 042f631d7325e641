//! Package version ordering
//!
//! Implements the pacman/rpm `vercmp` ordering: versions have the shape
//! `[epoch:]pkgver[-pkgrel]`. The epoch dominates, then `pkgver` is compared
//! segment by segment (numeric segments numerically, alpha segments
//! lexically, numeric beats alpha), then `pkgrel` if both sides have one.
//! Plain string comparison would put "1.10" before "1.9".

use std::cmp::Ordering;

/// Compare two version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let (epoch_a, ver_a, rel_a) = split_evr(a);
    let (epoch_b, ver_b, rel_b) = split_evr(b);

    segment_compare(epoch_a, epoch_b)
        .then_with(|| segment_compare(ver_a, ver_b))
        .then_with(|| match (rel_a, rel_b) {
            (Some(ra), Some(rb)) => segment_compare(ra, rb),
            _ => Ordering::Equal,
        })
}

/// Whether `candidate` is strictly newer than `installed`.
pub fn is_newer(candidate: &str, installed: &str) -> bool {
    compare(candidate, installed) == Ordering::Greater
}

/// Whether `version` meets the `minimum`.
pub fn satisfies(version: &str, minimum: &str) -> bool {
    compare(version, minimum) != Ordering::Less
}

/// Split `[epoch:]version[-release]`.
///
/// The epoch is only recognised when everything before the colon is digits;
/// a missing epoch is "0".
fn split_evr(evr: &str) -> (&str, &str, Option<&str>) {
    let digits = evr.bytes().take_while(u8::is_ascii_digit).count();
    let rest = &evr[digits..];

    let (epoch, rest) = match rest.strip_prefix(':') {
        Some(after) => {
            let epoch = &evr[..digits];
            (if epoch.is_empty() { "0" } else { epoch }, after)
        }
        None => ("0", evr),
    };

    match rest.rfind('-') {
        Some(idx) => (epoch, &rest[..idx], Some(&rest[idx + 1..])),
        None => (epoch, rest, None),
    }
}

/// Segment-wise comparison of a single component (rpmvercmp).
fn segment_compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);
    // Ends of the previous segment, used to compare separator lengths
    let (mut prev_i, mut prev_j) = (0usize, 0usize);

    while i < a.len() && j < b.len() {
        while i < a.len() && !a[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < b.len() && !b[j].is_ascii_alphanumeric() {
            j += 1;
        }
        if i >= a.len() || j >= b.len() {
            break;
        }

        // Differing separator runs decide on their own
        if i - prev_i != j - prev_j {
            return (i - prev_i).cmp(&(j - prev_j));
        }

        let numeric = a[i].is_ascii_digit();
        let seg_a_end = segment_end(a, i, numeric);
        let seg_b_end = segment_end(b, j, numeric);

        // Segment types differ: numeric is newer than alpha
        if seg_b_end == j {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg_a = &a[i..seg_a_end];
        let mut seg_b = &b[j..seg_b_end];

        if numeric {
            seg_a = trim_leading_zeros(seg_a);
            seg_b = trim_leading_zeros(seg_b);
            match seg_a.len().cmp(&seg_b.len()) {
                Ordering::Equal => {}
                other => return other,
            }
        }

        match seg_a.cmp(seg_b) {
            Ordering::Equal => {}
            other => return other,
        }

        i = seg_a_end;
        j = seg_b_end;
        prev_i = i;
        prev_j = j;
    }

    let rest_a = &a[i.min(a.len())..];
    let rest_b = &b[j.min(b.len())..];

    // All segments equal, only separators differed
    if rest_a.is_empty() && rest_b.is_empty() {
        return Ordering::Equal;
    }

    // A remaining alpha string never beats an empty one:
    // "1.0" > "1.0alpha", "1.0.1" > "1.0"
    let a_empty_b_not_alpha = rest_a.is_empty() && !rest_b.first().is_some_and(u8::is_ascii_alphabetic);
    let a_alpha = rest_a.first().is_some_and(u8::is_ascii_alphabetic);
    if a_empty_b_not_alpha || a_alpha {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn segment_end(s: &[u8], start: usize, numeric: bool) -> usize {
    let mut end = start;
    while end < s.len()
        && (if numeric {
            s[end].is_ascii_digit()
        } else {
            s[end].is_ascii_alphabetic()
        })
    {
        end += 1;
    }
    end
}

fn trim_leading_zeros(s: &[u8]) -> &[u8] {
    let zeros = s.iter().take_while(|c| **c == b'0').count();
    &s[zeros..]
}
