use crate::cli::LookupArgs;
use crate::error::Result;
use hiers::cache::{self, ScaffoldCache};
use std::io::Write;
use tracing::info;

pub fn run(args: LookupArgs) -> Result<()> {
    info!(backend = %args.backend, path = ?args.cache_path, "Opening scaffold cache...");
    let cache = cache::open(args.backend, Some(args.cache_path.as_path()))?;
    let mut out = std::io::stdout().lock();
    write_records(cache.as_ref(), &args.ids, &mut out)
}

fn write_records(cache: &dyn ScaffoldCache, ids: &[u64], out: &mut impl Write) -> Result<()> {
    for &id in ids {
        match cache.get_record(id)? {
            Some(record) => {
                writeln!(out, "{}\t{}\t{}", record.id, record.key, cache.subtree_string(id)?)?;
            }
            None => writeln!(out, "{id}\t<not found>")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiers::cache::InMemoryCache;

    #[test]
    fn records_are_listed_with_their_tree_strings() {
        let cache = InMemoryCache::new();
        let parent = cache.insert_new("c1ccc(Cc2ccncc2)cc1").unwrap();
        let child = cache.insert_new("[H]c1ccncc1").unwrap();
        cache.put_child_link(parent, child).unwrap();

        let mut out = Vec::new();
        write_records(&cache, &[1, 2, 5], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "1\tc1ccc(Cc2ccncc2)cc1\t1:(2)");
        assert_eq!(lines[1], "2\t[H]c1ccncc1\t2");
        assert_eq!(lines[2], "5\t<not found>");
    }
}
