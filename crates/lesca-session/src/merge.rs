//! Combining two session records, e.g. when a short-lived scrape session's
//! state should be folded back into a long-lived one.

use lesca_types::SessionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// `into`'s cookies and storage entries win on key collision.
    KeepExisting,
    /// `from`'s cookies and storage entries win on key collision.
    PreferFresh,
    /// Every cookie and storage entry from both is kept; `from` wins ties.
    MergeAll,
}

fn fold_in(merged: &mut SessionRecord, from: SessionRecord, keep_existing: bool) {
    if keep_existing {
        let existing: std::collections::HashSet<_> = merged.cookies.iter().map(|c| c.merge_key()).collect();
        for cookie in from.cookies {
            if !existing.contains(&cookie.merge_key()) {
                merged.cookies.push(cookie);
            }
        }
        for (k, v) in from.local_storage {
            merged.local_storage.entry(k).or_insert(v);
        }
        for (k, v) in from.session_storage {
            merged.session_storage.entry(k).or_insert(v);
        }
    } else {
        for cookie in from.cookies {
            let key = cookie.merge_key();
            merged.cookies.retain(|c| c.merge_key() != key);
            merged.cookies.push(cookie);
        }
        merged.local_storage.extend(from.local_storage);
        merged.session_storage.extend(from.session_storage);
    }
}

/// Merges `target`'s baseline with `sources`, per (cookie name, domain,
/// path) and per storage key.
///
/// `keep_existing` takes `target` as baseline and only adds keys absent
/// from it, folding `sources` in the order given. `prefer_fresh` sorts
/// `sources` oldest-first by `last_used_at` so the most recently used
/// source's keys are folded in last and win ties. `merge_all` folds
/// `sources` in the order given, last write wins -- callers that want a
/// specific precedence order should pass `sources` already ordered.
pub fn merge_records(target: SessionRecord, mut sources: Vec<SessionRecord>, strategy: MergeStrategy) -> SessionRecord {
    let mut merged = target;

    match strategy {
        MergeStrategy::KeepExisting => {
            for source in sources {
                fold_in(&mut merged, source, true);
            }
        }
        MergeStrategy::PreferFresh => {
            sources.sort_by_key(|r| r.metadata.last_used_at);
            for source in sources {
                fold_in(&mut merged, source, false);
            }
        }
        MergeStrategy::MergeAll => {
            for source in sources {
                fold_in(&mut merged, source, false);
            }
        }
    }

    merged.metadata.last_used_at = lesca_utils::now_unix_millis();
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesca_types::Cookie;

    fn cookie(name: &str, value: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: "example.com".to_string(),
            path: "/".to_string(),
            expires: -1,
            http_only: false,
            secure: false,
            same_site: None,
        }
    }

    #[test]
    fn keep_existing_does_not_overwrite() {
        let mut target = SessionRecord::new("a", 0);
        target.cookies.push(cookie("session", "old"));
        let mut source = SessionRecord::new("b", 0);
        source.cookies.push(cookie("session", "new"));

        let merged = merge_records(target, vec![source], MergeStrategy::KeepExisting);
        assert_eq!(merged.cookies.len(), 1);
        assert_eq!(merged.cookies[0].value, "old");
    }

    #[test]
    fn prefer_fresh_overwrites() {
        let mut target = SessionRecord::new("a", 0);
        target.metadata.last_used_at = 0;
        target.cookies.push(cookie("session", "old"));
        let mut source = SessionRecord::new("b", 100);
        source.cookies.push(cookie("session", "new"));

        let merged = merge_records(target, vec![source], MergeStrategy::PreferFresh);
        assert_eq!(merged.cookies.len(), 1);
        assert_eq!(merged.cookies[0].value, "new");
    }

    #[test]
    fn prefer_fresh_picks_newest_among_several_sources() {
        let target = SessionRecord::new("a", 0);
        let mut stale = SessionRecord::new("b", 10);
        stale.cookies.push(cookie("session", "stale"));
        let mut fresh = SessionRecord::new("c", 200);
        fresh.cookies.push(cookie("session", "fresh"));

        let merged = merge_records(target, vec![stale, fresh], MergeStrategy::PreferFresh);
        assert_eq!(merged.cookies.len(), 1);
        assert_eq!(merged.cookies[0].value, "fresh");
    }

    #[test]
    fn merge_all_unions_distinct_keys() {
        let target = SessionRecord::new("a", 0);
        let mut s1 = SessionRecord::new("b", 0);
        s1.cookies.push(cookie("one", "1"));
        let mut s2 = SessionRecord::new("c", 0);
        s2.cookies.push(cookie("two", "2"));

        let merged = merge_records(target, vec![s1, s2], MergeStrategy::MergeAll);
        assert_eq!(merged.cookies.len(), 2);
    }
}
