use crate::layout::{LayoutEntry, Pack, StructLayout};

/// How much of a struct is data and how much is padding. Tail padding counts
/// as padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutStats {
    pub data_bytes: u64,
    pub padding_bytes: u64,
}

impl LayoutStats {
    pub fn of(layout: &StructLayout) -> LayoutStats {
        let data_bytes = layout.fields.iter().map(|entry| entry.size).sum::<u64>();
        LayoutStats {
            data_bytes,
            padding_bytes: layout.total_size.saturating_sub(data_bytes),
        }
    }

    /// Data bytes as a percentage of the total size.
    pub fn efficiency(&self) -> f64 {
        let total = self.data_bytes + self.padding_bytes;
        if total == 0 {
            return 0.0;
        }

        self.data_bytes as f64 / total as f64 * 100.0
    }
}

fn member_label(entry: &LayoutEntry) -> String {
    if let Some(bit_fields) = &entry.bit_fields {
        let members = bit_fields
            .iter()
            .map(|bit_field| format!("{}:{}", bit_field.name, bit_field.bits))
            .collect::<Vec<_>>()
            .join(", ");
        return format!("{} {members}", entry.ty);
    }

    let mut label = if entry.is_pointer && !entry.is_function_ptr() {
        format!("{} *{}", entry.ty, entry.name)
    } else {
        format!("{} {}", entry.ty, entry.name)
    };

    if entry.is_array {
        label.push_str(&format!("[{}]", entry.count));
    }

    label
}

fn short_label(entry: &LayoutEntry) -> String {
    if let Some(bit_fields) = &entry.bit_fields {
        return bit_fields
            .iter()
            .map(|bit_field| format!("{}:{}", bit_field.name, bit_field.bits))
            .collect::<Vec<_>>()
            .join(",");
    }

    let mut label = entry.name.clone();
    if entry.is_function_ptr() {
        label.push_str("_fn");
    } else if entry.is_pointer {
        label.push('*');
    }

    if entry.is_array {
        label.push_str(&format!("[{}]", entry.count));
    }

    label
}

/// Summary line plus one row per member.
pub fn render_table(name: &str, layout: &StructLayout, pack: Option<Pack>) -> String {
    let alignment = match pack {
        Some(pack) => format!("packed to {pack}"),
        None => "natural alignment".to_string(),
    };

    let mut out = format!(
        "struct {name}: size {}, align {}, {alignment}\n",
        layout.total_size, layout.max_align
    );
    out.push_str(&format!(
        "  {:>6}  {:>4}  {:>3}  {}\n",
        "offset", "size", "pad", "member"
    ));

    for entry in &layout.fields {
        out.push_str(&format!(
            "  {:>6}  {:>4}  {:>3}  {}\n",
            entry.offset,
            entry.size,
            entry.padding_before,
            member_label(entry)
        ));
    }

    let stats = LayoutStats::of(layout);
    out.push_str(&format!(
        "  data {} B, padding {} B, efficiency {:.1}%\n",
        stats.data_bytes,
        stats.padding_bytes,
        stats.efficiency()
    ));

    out
}

struct Segment {
    start: u64,
    end: u64,
    label: String,
}

fn segments(layout: &StructLayout) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut end: u64 = 0;

    for entry in &layout.fields {
        if entry.padding_before > 0 {
            segments.push(Segment {
                start: entry.offset - entry.padding_before,
                end: entry.offset,
                label: "pad".to_string(),
            });
        }

        if entry.size > 0 {
            segments.push(Segment {
                start: entry.offset,
                end: entry.end(),
                label: short_label(entry),
            });
        }

        end = entry.end();
    }

    if layout.total_size > end {
        segments.push(Segment {
            start: end,
            end: layout.total_size,
            label: "pad".to_string(),
        });
    }

    segments
}

/// The struct's bytes in rows of `pack` bytes (or `max_align` bytes when not
/// packed). Each row lists the members and padding it holds with the number
/// of bytes they take in that row. Rows fully inside one long member that
/// continues past them are folded into a single `...` line.
pub fn render_byte_map(layout: &StructLayout, pack: Option<Pack>) -> String {
    let row_bytes = pack.map_or(layout.max_align, Pack::get).max(1);
    let segments = segments(layout);

    let mut out = String::new();
    let mut row_start: u64 = 0;

    while row_start < layout.total_size {
        let row_end = row_start.saturating_add(row_bytes).min(layout.total_size);

        let parts = segments
            .iter()
            .filter(|segment| segment.start < row_end && segment.end > row_start)
            .map(|segment| {
                let len = segment.end.min(row_end) - segment.start.max(row_start);
                (segment, len)
            })
            .collect::<Vec<_>>();

        if let [(segment, _)] = parts.as_slice() {
            if segment.start < row_start && segment.end > row_end {
                // Jump to the row holding the segment's last byte.
                out.push_str("  ...\n");
                let last_row = (segment.end - 1) / row_bytes * row_bytes;
                row_start = last_row.max(row_start.saturating_add(row_bytes));
                continue;
            }
        }

        out.push_str(&format!("  [{row_start:>4}]"));
        for (segment, len) in parts {
            out.push_str(&format!(" {}({len})", segment.label));
        }
        out.push('\n');

        row_start = match row_start.checked_add(row_bytes) {
            Some(next) => next,
            None => break,
        };
    }

    out
}

/// Field table followed by the byte map.
pub fn render_layout(name: &str, layout: &StructLayout, pack: Option<Pack>) -> String {
    let mut out = render_table(name, layout, pack);
    out.push_str(&render_byte_map(layout, pack));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeCatalog;
    use crate::layout::compute_layout;
    use crate::parser::parse;
    use std::num::NonZeroU64;

    fn layout_of(source: &str, name: &str, pack: Option<Pack>) -> StructLayout {
        let structs = parse(source).structs;
        compute_layout(name, &TypeCatalog::default(), &structs, pack).unwrap()
    }

    #[test]
    fn stats_count_tail_padding() {
        let layout = layout_of("struct S { int a; char b; };", "S", None);
        let stats = LayoutStats::of(&layout);

        assert_eq!(stats, LayoutStats { data_bytes: 5, padding_bytes: 3 });
        assert_eq!(stats.efficiency(), 62.5);
    }

    #[test]
    fn empty_struct_has_zero_efficiency() {
        let layout = layout_of("struct E { };", "E", None);

        assert_eq!(LayoutStats::of(&layout).efficiency(), 0.0);
        assert_eq!(render_byte_map(&layout, None), "");
    }

    #[test]
    fn table_lists_every_member() {
        let layout = layout_of("struct P { char a; int b; char *c; };", "P", None);

        assert_eq!(
            render_table("P", &layout, None),
            "struct P: size 12, align 4, natural alignment
  offset  size  pad  member
       0     1    0  char a
       4     4    3  int b
       8     4    0  char *c
  data 9 B, padding 3 B, efficiency 75.0%
"
        );
    }

    #[test]
    fn byte_map_rows_follow_the_pack_value() {
        let source = "struct P { char a; int b; char *c; };";

        let layout = layout_of(source, "P", None);
        assert_eq!(
            render_byte_map(&layout, None),
            "  [   0] a(1) pad(3)\n  [   4] b(4)\n  [   8] c*(4)\n"
        );

        let pack = NonZeroU64::new(2);
        let layout = layout_of(source, "P", pack);
        assert_eq!(
            render_byte_map(&layout, pack),
            "  [   0] a(1) pad(1)\n  [   2] b(2)\n  [   4] b(2)\n  [   6] c*(2)\n  [   8] c*(2)\n"
        );
    }

    #[test]
    fn byte_map_folds_long_members() {
        let layout = layout_of("struct Buf { int len; char data[16]; char tail; };", "Buf", None);

        assert_eq!(
            render_byte_map(&layout, None),
            "  [   0] len(4)\n  [   4] data[16](4)\n  ...\n  [  16] data[16](4)\n  [  20] tail(1) pad(3)\n"
        );
    }

    #[test]
    fn byte_map_of_a_huge_array_stays_short() {
        let layout = layout_of("struct Big { int len; char data[1099511627776]; };", "Big", None);

        assert_eq!(
            render_byte_map(&layout, None),
            "  [   0] len(4)\n  [   4] data[1099511627776](4)\n  ...\n  [1099511627776] data[1099511627776](4)\n"
        );
    }

    #[test]
    fn labels_mark_pointers_function_pointers_and_bit_fields() {
        let layout = layout_of(
            "struct L { uint8 a:2; uint8 b:3; void (*cb)(void); char *names[3]; };",
            "L",
            None,
        );

        assert_eq!(
            render_layout("L", &layout, None),
            "struct L: size 20, align 4, natural alignment
  offset  size  pad  member
       0     1    0  uint8 a:2, b:3
       4     4    3  function_ptr cb
       8    12    0  char *names[3]
  data 17 B, padding 3 B, efficiency 85.0%
  [   0] a:2,b:3(1) pad(3)
  [   4] cb_fn(4)
  [   8] names*[3](4)
  ...
  [  16] names*[3](4)
"
        );
    }
}
