//! Configuration and query-selector types.

/// Options controlling how a file is opened and queried.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Re-count mask bits on segment decode and reject records whose
    /// stored area disagrees.
    /// Default: false
    pub strict: bool,

    /// Allow point and rectangle queries to materialize missing segments
    /// on demand instead of failing with `NotLoaded`.
    /// Default: false
    pub auto_fill: bool,
}

impl OpenOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets strict segment validation.
    pub fn strict(mut self, value: bool) -> Self {
        self.strict = value;
        self
    }

    /// Sets on-demand segment materialization for queries.
    pub fn auto_fill(mut self, value: bool) -> Self {
        self.auto_fill = value;
        self
    }
}

/// Selector describing which entries a `fetch` call materializes.
///
/// Selection is additive across calls: once a key's IID or segment is
/// loaded it stays loaded. IIDs and segments are both materialized
/// unless explicitly switched off.
#[derive(Debug, Clone, Default)]
pub struct Fetch {
    pub(crate) everything: bool,
    pub(crate) all_keys: bool,
    pub(crate) keys: Vec<u32>,
    pub(crate) groups: Vec<String>,
    pub(crate) iids: Option<bool>,
    pub(crate) segs: Option<bool>,
}

impl Fetch {
    /// Selects nothing; combine with `keys`, `groups`, or the flag
    /// setters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects every key and loads both IIDs and segments, ignoring the
    /// `iids`/`segs` flags.
    pub fn everything() -> Self {
        Self { everything: true, ..Self::default() }
    }

    /// Selects every key while still honoring the `iids`/`segs` flags.
    pub fn all_keys() -> Self {
        Self { all_keys: true, ..Self::default() }
    }

    /// Adds explicit keys to the selection.
    pub fn keys<I: IntoIterator<Item = u32>>(mut self, keys: I) -> Self {
        self.keys.extend(keys);
        self
    }

    /// Adds the members of the named groups to the selection.
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Sets whether IID bytes are materialized for selected keys.
    pub fn iids(mut self, load: bool) -> Self {
        self.iids = Some(load);
        self
    }

    /// Sets whether segment records are materialized for selected keys.
    pub fn segs(mut self, load: bool) -> Self {
        self.segs = Some(load);
        self
    }
}

/// In-memory predicate over already-loaded entries.
///
/// Entries whose tested attribute is not materialized are excluded, not
/// loaded.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub(crate) groups: Vec<String>,
    pub(crate) domains: Vec<Vec<u8>>,
    pub(crate) min_area: Option<u32>,
    pub(crate) max_area: Option<u32>,
}

impl Filter {
    /// Creates an empty filter matching every loaded entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to members of the named groups.
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Restricts to entries whose IID domain matches one of the given
    /// byte strings.
    pub fn domains<I, B>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.domains.extend(domains.into_iter().map(|d| d.as_ref().to_vec()));
        self
    }

    /// Restricts to segments whose area lies strictly between the given
    /// bounds. `None` leaves that side unbounded.
    pub fn area(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.min_area = min;
        self.max_area = max;
        self
    }
}

/// How a rectangle query decides that a segment matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionTest {
    /// Envelope bounding-box overlap only. Cheap, may over-match.
    Coarse,
    /// Bounding-box overlap plus at least one shared set pixel.
    Exact,
}
