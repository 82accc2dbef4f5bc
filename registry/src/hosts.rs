//! Known-host table for the `github` registry.
//!
//! Each entry maps an authority suffix to a function that builds the raw-file
//! URL for an identifier. Supporting a new host means adding a row here.

use lexicon_pm_core::Nsid;

const RAW_GITHUB: &str = "https://raw.githubusercontent.com";

/// One row of the known-host table.
pub struct KnownHost {
    /// Authority suffix, matched on a label boundary.
    pub suffix: &'static str,
    build: fn(&Nsid) -> String,
}

impl KnownHost {
    /// Returns `true` if `authority` equals the suffix or ends with `.{suffix}`.
    pub fn matches(&self, authority: &str) -> bool {
        authority == self.suffix
            || authority
                .strip_suffix(self.suffix)
                .is_some_and(|rest| rest.ends_with('.'))
    }

    /// Builds the raw-file URL for `nsid`.
    pub fn url(&self, nsid: &Nsid) -> String {
        (self.build)(nsid)
    }
}

fn full_path(nsid: &Nsid) -> String {
    nsid.to_path("json")
}

fn tail_path(nsid: &Nsid) -> String {
    let tail: Vec<&str> = nsid.segments().skip(2).collect();
    format!("{}.json", tail.join("/"))
}

fn atproto(nsid: &Nsid) -> String {
    format!("{RAW_GITHUB}/bluesky-social/atproto/refs/heads/main/lexicons/{}", full_path(nsid))
}

/// The built-in table.
pub static KNOWN_HOSTS: &[KnownHost] = &[
    KnownHost { suffix: "bsky.app", build: atproto },
    KnownHost { suffix: "bsky.chat", build: atproto },
    KnownHost { suffix: "atproto.com", build: atproto },
    KnownHost { suffix: "ozone.tools", build: atproto },
    KnownHost {
        suffix: "linkat.blue",
        build: |n| format!("{RAW_GITHUB}/mkizka/linkat/refs/heads/main/lexicons/{}", full_path(n)),
    },
    KnownHost {
        suffix: "whtwnd.com",
        build: |n| format!("{RAW_GITHUB}/whtwnd/whitewind-blog/refs/heads/main/lexicons/{}", full_path(n)),
    },
    KnownHost {
        suffix: "unravel.fyi",
        build: |n| format!("{RAW_GITHUB}/likeandscribe/frontpage/refs/heads/main/lexicons/{}", full_path(n)),
    },
    KnownHost {
        suffix: "smokesignal.events",
        build: |n| format!("{RAW_GITHUB}/SmokeSignal-Events/lexicon/refs/heads/main/{}", full_path(n)),
    },
    KnownHost {
        suffix: "pastesphere.link",
        build: |n| format!("{RAW_GITHUB}/echo8/pastesphere/refs/heads/main/lexicons/{}", tail_path(n)),
    },
    KnownHost {
        suffix: "psky.social",
        build: |n| format!("{RAW_GITHUB}/psky-atp/appview/refs/heads/main/lexicons/{}", full_path(n)),
    },
    KnownHost {
        suffix: "moji.blue",
        build: |n| format!("{RAW_GITHUB}/marukun712/stellar/refs/heads/master/lexicons/bluemoji/{}", tail_path(n)),
    },
    KnownHost {
        suffix: "stellar.maril.blue",
        build: |n| format!("{RAW_GITHUB}/marukun712/stellar/refs/heads/master/lexicons/stellar/{}.json", n.name()),
    },
    KnownHost {
        suffix: "evex.land",
        build: |n| format!("{RAW_GITHUB}/evex-dev/atratch-server/refs/heads/main/lexicons/{}", full_path(n)),
    },
];

/// Finds the table row serving `nsid`'s authority.
pub fn known_host(nsid: &Nsid) -> Option<&'static KnownHost> {
    let authority = nsid.authority();
    KNOWN_HOSTS.iter().find(|host| host.matches(&authority))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(nsid: &str) -> Option<String> {
        let nsid = Nsid::parse(nsid).unwrap();
        known_host(&nsid).map(|h| h.url(&nsid))
    }

    #[test]
    fn test_bluesky_hosts() {
        assert_eq!(
            url("app.bsky.feed.post").as_deref(),
            Some("https://raw.githubusercontent.com/bluesky-social/atproto/refs/heads/main/lexicons/app/bsky/feed/post.json")
        );
        assert!(url("com.atproto.repo.getRecord").is_some());
        assert!(url("tools.ozone.moderation.defs").is_some());
    }

    #[test]
    fn test_tail_path_hosts() {
        assert_eq!(
            url("link.pastesphere.snippet").as_deref(),
            Some("https://raw.githubusercontent.com/echo8/pastesphere/refs/heads/main/lexicons/snippet.json")
        );
        assert_eq!(
            url("blue.moji.collection.item").as_deref(),
            Some("https://raw.githubusercontent.com/marukun712/stellar/refs/heads/master/lexicons/bluemoji/collection/item.json")
        );
        assert_eq!(
            url("blue.maril.stellar.reaction").as_deref(),
            Some("https://raw.githubusercontent.com/marukun712/stellar/refs/heads/master/lexicons/stellar/reaction.json")
        );
    }

    #[test]
    fn test_suffix_matches_on_label_boundary() {
        assert!(url("com.example.foo").is_none());
        // authority `notbsky.app` must not match `bsky.app`
        assert!(url("app.notbsky.foo").is_none());
    }
}
