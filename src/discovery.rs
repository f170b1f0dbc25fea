// Device autodiscovery: list candidate nodes, then take the first one a probe accepts.
//
// The directory listing is the only part that touches the OS; picking a device
// is a plain function over the candidate list so it can be exercised without
// real hardware.

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};

/// Entries of `dir` whose file name starts with `prefix`, in version order
/// (`fb2` before `fb10`).
pub fn list_candidates(dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix))
        .collect();

    names.sort_by(|a, b| version_cmp(a, b));
    Ok(names.into_iter().map(|name| dir.join(name)).collect())
}

/// First candidate for which `probe` yields a device. A probe returns `None`
/// both for devices that fail to open and for devices that lack a required
/// capability; it is expected to log why.
pub fn first_match<T, I, F>(candidates: I, mut probe: F) -> Option<(PathBuf, T)>
where
    I: IntoIterator<Item = PathBuf>,
    F: FnMut(&Path) -> Option<T>,
{
    candidates
        .into_iter()
        .find_map(|path| probe(&path).map(|device| (path, device)))
}

/// Compare names treating embedded digit runs as numbers.
pub fn version_cmp(a: &str, b: &str) -> Ordering {
    let (mut a, mut b) = (a.as_bytes(), b.as_bytes());

    loop {
        match (a.first(), b.first()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let da = a.iter().take_while(|c| c.is_ascii_digit()).count();
                let db = b.iter().take_while(|c| c.is_ascii_digit()).count();
                let (na, ra) = a.split_at(da);
                let (nb, rb) = b.split_at(db);

                // Leading zeros aside, a longer digit run is the larger number.
                let na = trim_zeros(na);
                let nb = trim_zeros(nb);
                let ord = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb));
                if ord != Ordering::Equal {
                    return ord;
                }
                a = ra;
                b = rb;
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(y);
                }
                a = &a[1..];
                b = &b[1..];
            }
        }
    }
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let zeros = digits.iter().take_while(|&&c| c == b'0').count();
    &digits[zeros..]
}
