use crate::libs::hierarchy::{Hierarchy, NodeId};
use crate::libs::track::{TrackRecord, COLOR_FIELD};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An RGB triple, printed the way trackDb wants it: `r,g,b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    pub fn from_hex(hex: u32) -> Self {
        Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.0, self.1, self.2)
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// `#rrggbb` or `r,g,b`
    ///
    /// ```
    /// use hubr::libs::color::Rgb;
    /// assert_eq!("#1f77b4".parse::<Rgb>().unwrap(), Rgb(31, 119, 180));
    /// assert_eq!("31, 119,180".parse::<Rgb>().unwrap(), Rgb(31, 119, 180));
    /// assert!("#12345".parse::<Rgb>().is_err());
    /// assert!("1,2".parse::<Rgb>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(format!("`{}` is not a #rrggbb color", s));
            }
            let v = u32::from_str_radix(hex, 16).map_err(|e| e.to_string())?;
            return Ok(Rgb::from_hex(v));
        }

        let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
        if parts.len() != 3 {
            return Err(format!("`{}` is not an r,g,b color", s));
        }
        let mut channels = [0u8; 3];
        for (c, p) in channels.iter_mut().zip(parts) {
            *c = p
                .parse::<u8>()
                .map_err(|_| format!("`{}` is not an r,g,b color", s))?;
        }
        Ok(Rgb(channels[0], channels[1], channels[2]))
    }
}

const TAB10: [u32; 10] = [
    0x1f77b4, 0xff7f0e, 0x2ca02c, 0xd62728, 0x9467bd, 0x8c564b, 0xe377c2, 0x7f7f7f, 0xbcbd22,
    0x17becf,
];

const TAB20: [u32; 20] = [
    0x1f77b4, 0xaec7e8, 0xff7f0e, 0xffbb78, 0x2ca02c, 0x98df8a, 0xd62728, 0xff9896, 0x9467bd,
    0xc5b0d5, 0x8c564b, 0xc49c94, 0xe377c2, 0xf7b6d2, 0x7f7f7f, 0xc7c7c7, 0xbcbd22, 0xdbdb8d,
    0x17becf, 0x9edae5,
];

const TAB20B: [u32; 20] = [
    0x393b79, 0x5254a3, 0x6b6ecf, 0x9c9ede, 0x637939, 0x8ca252, 0xb5cf6b, 0xcedb9c, 0x8c6d31,
    0xbd9e39, 0xe7ba52, 0xe7cb94, 0x843c39, 0xad494a, 0xd6616b, 0xe7969c, 0x7b4173, 0xa55194,
    0xce6dbd, 0xde9ed6,
];

const TAB20C: [u32; 20] = [
    0x3182bd, 0x6baed6, 0x9ecae1, 0xc6dbef, 0xe6550d, 0xfd8d3c, 0xfdae6b, 0xfdd0a2, 0x31a354,
    0x74c476, 0xa1d99b, 0xc7e9c0, 0x756bb1, 0x9e9ac8, 0xbcbddc, 0xdadaeb, 0x636363, 0x969696,
    0xbdbdbd, 0xd9d9d9,
];

const SET1: [u32; 9] = [
    0xe41a1c, 0x377eb8, 0x4daf4a, 0x984ea3, 0xff7f00, 0xffff33, 0xa65628, 0xf781bf, 0x999999,
];

const SET2: [u32; 8] = [
    0x66c2a5, 0xfc8d62, 0x8da0cb, 0xe78ac3, 0xa6d854, 0xffd92f, 0xe5c494, 0xb3b3b3,
];

const DARK2: [u32; 8] = [
    0x1b9e77, 0xd95f02, 0x7570b3, 0xe7298a, 0x66a61e, 0xe6ab02, 0xa6761d, 0x666666,
];

/// Named qualitative color schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    Tab10,
    #[default]
    Tab20,
    Tab20b,
    Tab20c,
    Set1,
    Set2,
    Dark2,
}

impl Palette {
    pub const NAMES: [&'static str; 7] =
        ["tab10", "tab20", "tab20b", "tab20c", "set1", "set2", "dark2"];

    fn hexes(&self) -> &'static [u32] {
        match self {
            Palette::Tab10 => &TAB10,
            Palette::Tab20 => &TAB20,
            Palette::Tab20b => &TAB20B,
            Palette::Tab20c => &TAB20C,
            Palette::Set1 => &SET1,
            Palette::Set2 => &SET2,
            Palette::Dark2 => &DARK2,
        }
    }

    pub fn len(&self) -> usize {
        self.hexes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hexes().is_empty()
    }

    /// The `i`-th color, wrapping around past the end.
    pub fn color(&self, i: usize) -> Rgb {
        let hexes = self.hexes();
        Rgb::from_hex(hexes[i % hexes.len()])
    }
}

impl fmt::Display for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Palette::Tab10 => "tab10",
            Palette::Tab20 => "tab20",
            Palette::Tab20b => "tab20b",
            Palette::Tab20c => "tab20c",
            Palette::Set1 => "set1",
            Palette::Set2 => "set2",
            Palette::Dark2 => "dark2",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Palette {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tab10" => Ok(Palette::Tab10),
            "tab20" => Ok(Palette::Tab20),
            "tab20b" => Ok(Palette::Tab20b),
            "tab20c" => Ok(Palette::Tab20c),
            "set1" => Ok(Palette::Set1),
            "set2" => Ok(Palette::Set2),
            "dark2" => Ok(Palette::Dark2),
            _ => Err(format!(
                "unknown palette `{}`, choose one of {}",
                s,
                Palette::NAMES.join(", ")
            )),
        }
    }
}

/// A scope had more distinct values than its palette has colors, so colors
/// repeat inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteExhausted {
    pub scope: String,
    pub distinct: usize,
    pub palette_size: usize,
}

impl fmt::Display for PaletteExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} distinct values in `{}` but the palette has {} colors; colors repeat",
            self.distinct, self.scope, self.palette_size
        )
    }
}

/// Colors of one built hierarchy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColorAssignment {
    pub key: Option<String>,
    /// scope path → value → color
    pub scopes: IndexMap<String, IndexMap<String, Rgb>>,
    /// track id → color
    pub tracks: IndexMap<String, Rgb>,
    pub default: Rgb,
    pub warnings: Vec<PaletteExhausted>,
}

impl ColorAssignment {
    /// Every track gets `default`.
    pub fn uniform(hier: &Hierarchy, default: Rgb) -> Self {
        let tracks = hier
            .tracks()
            .into_iter()
            .map(|r| (r.id.clone(), default))
            .collect();
        Self {
            key: None,
            scopes: IndexMap::new(),
            tracks,
            default,
            warnings: vec![],
        }
    }

    pub fn track_color(&self, track_id: &str) -> Option<Rgb> {
        self.tracks.get(track_id).copied()
    }

    pub fn color_of(&self, scope: &str, value: &str) -> Option<Rgb> {
        self.scopes.get(scope).and_then(|m| m.get(value)).copied()
    }
}

/// Maps the values of one column to palette colors, one table per scope.
///
/// A scope is the root or a supertrack; the tracks under it, minus those
/// under a nested supertrack, share the table. The `i`-th distinct value in
/// table order gets the `i`-th color.
#[derive(Debug, Clone)]
pub struct ColorAssigner {
    key: Option<String>,
    palette: Palette,
    default: Rgb,
}

impl ColorAssigner {
    pub fn new(key: Option<&str>, palette: Palette) -> Self {
        Self {
            key: key.map(|k| k.to_string()),
            palette,
            default: Rgb::BLACK,
        }
    }

    pub fn with_default(mut self, default: Rgb) -> Self {
        self.default = default;
        self
    }

    /// Value → color table of one scope. The scope is passed in explicitly
    /// so each table depends only on the tracks below it.
    ///
    /// ```
    /// use hubr::libs::color::{ColorAssigner, Palette, Rgb};
    /// use hubr::libs::design::TrackDesign;
    /// use hubr::libs::grouping::GroupingSpec;
    /// use hubr::libs::hierarchy::GroupingEngine;
    ///
    /// let table = "fn,assay\na.bw,ATAC\nb.bw,ChIP\nc.bw,ATAC\n";
    /// let design = TrackDesign::from_table(table.as_bytes(), "fn", None).unwrap();
    /// let hier = GroupingEngine::new(&design, &GroupingSpec::new()).build().unwrap();
    ///
    /// let assigner = ColorAssigner::new(Some("assay"), Palette::Tab10);
    /// let (table, warning) = assigner.assign_scope(&hier, hier.root());
    /// assert_eq!(table["ATAC"], Rgb(31, 119, 180));
    /// assert_eq!(table["ChIP"], Rgb(255, 127, 14));
    /// assert!(warning.is_none());
    /// ```
    pub fn assign_scope(
        &self,
        hier: &Hierarchy,
        scope: NodeId,
    ) -> (IndexMap<String, Rgb>, Option<PaletteExhausted>) {
        let mut table = IndexMap::new();
        let key = match &self.key {
            Some(k) => k,
            None => return (table, None),
        };

        for leaf in hier.scope_leaves(scope) {
            if let Some(value) = hier.node(leaf).track().and_then(|r| r.get(key)) {
                if !table.contains_key(value) {
                    let color = self.palette.color(table.len());
                    table.insert(value.to_string(), color);
                }
            }
        }

        let warning = if table.len() > self.palette.len() {
            Some(PaletteExhausted {
                scope: hier.path(scope),
                distinct: table.len(),
                palette_size: self.palette.len(),
            })
        } else {
            None
        };
        (table, warning)
    }

    /// Colors for every track of the hierarchy. Tracks without a value for
    /// the color column, or all tracks if there is no color column, get the
    /// default color. A track's own `color` field overrides all of this.
    pub fn assign(&self, hier: &Hierarchy) -> ColorAssignment {
        let mut result = match &self.key {
            Some(key) => self.assign_by(hier, key),
            None => ColorAssignment::uniform(hier, self.default),
        };
        for rec in hier.tracks() {
            if let Some(color) = explicit_color(rec) {
                result.tracks.insert(rec.id.clone(), color);
            }
        }
        result
    }

    fn assign_by(&self, hier: &Hierarchy, key: &str) -> ColorAssignment {
        let mut result = ColorAssignment {
            key: Some(key.to_string()),
            default: self.default,
            ..Default::default()
        };

        for scope in hier.color_scopes() {
            let (table, warning) = self.assign_scope(hier, scope);
            if let Some(w) = warning {
                log::warn!("{}", w);
                result.warnings.push(w);
            }
            for leaf in hier.scope_leaves(scope) {
                if let Some(rec) = hier.node(leaf).track() {
                    let color = rec
                        .get(key)
                        .and_then(|v| table.get(v).copied())
                        .unwrap_or(self.default);
                    result.tracks.insert(rec.id.clone(), color);
                }
            }
            if !table.is_empty() {
                result.scopes.insert(hier.path(scope), table);
            }
        }

        result
    }
}

/// The color a record sets for itself in its `color` field. Values that
/// don't parse are logged and ignored.
pub fn explicit_color(rec: &TrackRecord) -> Option<Rgb> {
    let value = rec.get(COLOR_FIELD)?;
    match value.parse::<Rgb>() {
        Ok(color) => Some(color),
        Err(e) => {
            log::warn!("Ignore the color of track {}: {}", rec.id, e);
            None
        }
    }
}
