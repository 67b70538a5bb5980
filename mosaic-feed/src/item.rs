//! Item ingestion and size extraction.
//!
//! The feed never interprets caller records beyond their intrinsic size. A
//! [`MapSize`] implementation pulls a [`RawSize`] out of each record; the size
//! is then validated into an [`ItemSize`] before it can reach a packer.

use mosaic_layout::{GeometryError, ItemSize, RawSize};
use serde_json::{Map, Value};

/// Field name pairs probed by [`DefaultSizeMapper`], in order.
pub const SIZE_FIELD_ALIASES: [(&str, &str); 3] =
    [("width", "height"), ("w", "h"), ("imgW", "imgH")];

/// Records that expose an intrinsic size by field name.
pub trait SizeSource {
    /// Reads a numeric field.
    fn dimension(&self, field: &str) -> Option<f64>;

    /// Reads the first width/height pair present under
    /// [`SIZE_FIELD_ALIASES`].
    fn raw_size(&self) -> Option<RawSize> {
        SIZE_FIELD_ALIASES.iter().find_map(|(width, height)| {
            Some(RawSize::new(self.dimension(width)?, self.dimension(height)?))
        })
    }
}

impl SizeSource for Map<String, Value> {
    fn dimension(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_f64)
    }
}

impl SizeSource for Value {
    fn dimension(&self, field: &str) -> Option<f64> {
        self.as_object()?.dimension(field)
    }
}

impl SizeSource for RawSize {
    fn dimension(&self, field: &str) -> Option<f64> {
        match field {
            "width" => Some(self.width),
            "height" => Some(self.height),
            _ => None,
        }
    }

    fn raw_size(&self) -> Option<RawSize> {
        Some(*self)
    }
}

/// Extracts the intrinsic size of a caller record.
pub trait MapSize<R> {
    /// Returns the record's size, or `None` when it has none.
    fn map_size(&self, item: &R) -> Option<RawSize>;
}

/// Reads sizes through [`SizeSource`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSizeMapper;

impl<R: SizeSource> MapSize<R> for DefaultSizeMapper {
    fn map_size(&self, item: &R) -> Option<RawSize> {
        item.raw_size()
    }
}

impl<R, F> MapSize<R> for F
where
    F: Fn(&R) -> Option<RawSize>,
{
    fn map_size(&self, item: &R) -> Option<RawSize> {
        self(item)
    }
}

/// A caller record together with its validated size.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem<R> {
    raw: R,
    size: ItemSize,
}

impl<R> FeedItem<R> {
    /// Validates `raw` through `mapper`.
    pub fn ingest<M>(raw: R, mapper: &M) -> Result<Self, GeometryError>
    where
        M: MapSize<R> + ?Sized,
    {
        let size = mapper.map_size(&raw).ok_or(GeometryError::MissingSize)?;
        let size = ItemSize::try_from(size)?;
        Ok(Self { raw, size })
    }

    /// The caller's record.
    pub fn raw(&self) -> &R {
        &self.raw
    }

    /// Validated intrinsic size.
    pub fn size(&self) -> ItemSize {
        self.size
    }

    /// `width / height`.
    pub fn width_ratio(&self) -> f64 {
        self.size.width_ratio()
    }

    /// Returns the caller's record.
    pub fn into_raw(self) -> R {
        self.raw
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(json!({"width": 300, "height": 200}), Some((300.0, 200.0)))]
    #[case(json!({"w": 120.5, "h": 80}), Some((120.5, 80.0)))]
    #[case(json!({"imgW": 64, "imgH": 32}), Some((64.0, 32.0)))]
    #[case(json!({"width": 10, "h": 5}), None)]
    #[case(json!({"width": "10", "height": 5}), None)]
    #[case(json!([1, 2]), None)]
    fn default_mapper_aliases(#[case] value: Value, #[case] expected: Option<(f64, f64)>) {
        let size = DefaultSizeMapper.map_size(&value);
        assert_eq!(size, expected.map(|(w, h)| RawSize::new(w, h)));
    }

    #[test]
    fn earlier_alias_wins() {
        let value = json!({"w": 1, "h": 1, "width": 40, "height": 20});
        assert_eq!(
            DefaultSizeMapper.map_size(&value),
            Some(RawSize::new(40.0, 20.0))
        );
    }

    #[test]
    fn ingest_validates() {
        let item = FeedItem::ingest(json!({"width": 300, "height": 150}), &DefaultSizeMapper)
            .unwrap();
        assert_eq!(item.width_ratio(), 2.0);

        assert_eq!(
            FeedItem::ingest(json!({"id": 1}), &DefaultSizeMapper).unwrap_err(),
            GeometryError::MissingSize
        );
        assert!(matches!(
            FeedItem::ingest(json!({"width": 0, "height": 150}), &DefaultSizeMapper),
            Err(GeometryError::NonPositive { .. })
        ));
    }

    #[test]
    fn closure_mapper() {
        struct Photo {
            dims: (u32, u32),
        }
        let mapper =
            |photo: &Photo| Some(RawSize::new(photo.dims.0 as f64, photo.dims.1 as f64));
        let item = FeedItem::ingest(Photo { dims: (90, 30) }, &mapper).unwrap();
        assert_eq!(item.width_ratio(), 3.0);
        assert_eq!(item.raw().dims, (90, 30));
    }
}
