//! A small set of concrete leaf items.
//!
//! The widget toolkit proper lives outside this crate; these leaves are
//! the building blocks layouts need regardless (spacers, solid fills,
//! static text) and double as the engine's own exercise material.

use std::sync::Arc;

use geom::{Point, Size};

use crate::{
    cache::{CacheKey, ComposerCache},
    composer::LeafPaint,
    draw::{Color, DrawList},
    error::Result,
    item::LeafItem,
    sizing::Sizing,
    surface::{FontMetrics, TextMetrics},
};

/// An item that takes up space and draws nothing. Used for spacing and
/// stretch entries in rows and columns.
pub struct EmptyItem;

struct EmptyPaint;

impl LeafPaint for EmptyPaint {
    fn paint(&self, _list: &mut DrawList, _size: Size) -> Result<()> {
        Ok(())
    }
}

impl LeafItem for EmptyItem {
    fn composer(&self, _cache: &ComposerCache) -> Option<Arc<dyn LeafPaint>> {
        Some(Arc::new(EmptyPaint))
    }
}

/// A solid color fill.
pub struct BackgroundItem {
    color: Color,
}

impl BackgroundItem {
    pub fn new(color: impl Into<Color>) -> Self {
        Self {
            color: color.into(),
        }
    }

    pub fn set_color(&mut self, color: impl Into<Color>) {
        self.color = color.into();
    }
}

struct BackgroundPaint {
    color: Color,
}

impl LeafPaint for BackgroundPaint {
    fn paint(&self, list: &mut DrawList, size: Size) -> Result<()> {
        list.fill_rect(size.rect(), self.color.clone());
        Ok(())
    }
}

impl LeafItem for BackgroundItem {
    fn composer(&self, _cache: &ComposerCache) -> Option<Arc<dyn LeafPaint>> {
        Some(Arc::new(BackgroundPaint {
            color: self.color.clone(),
        }))
    }
}

/// Static text. The rendered command list depends only on the text,
/// color, font, and baseline, so it is shared through the composer cache
/// across items and frames.
pub struct TextItem {
    text: String,
    color: Color,
    font: String,
    metrics: Option<TextMetrics>,
}

impl TextItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: "#000".into(),
            font: "12px sans-serif".into(),
            metrics: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Change the text. The owner must call `update` on the item for the
    /// change to reach the screen.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn set_color(&mut self, color: impl Into<Color>) {
        self.color = color.into();
    }

    pub fn set_font(&mut self, font: impl Into<String>) {
        self.font = font.into();
    }

    /// Measure the text and return the intrinsic sizing that fits it.
    pub fn size_to_content(&mut self, fonts: &dyn FontMetrics) -> Sizing {
        let metrics = fonts.measure(&self.font, &self.text);
        self.metrics = Some(metrics);
        Sizing::new().with_fixed_size(Size::new(metrics.width, metrics.height))
    }
}

struct TextPaint {
    list: Arc<DrawList>,
}

impl LeafPaint for TextPaint {
    fn paint(&self, list: &mut DrawList, _size: Size) -> Result<()> {
        list.splice(self.list.clone());
        Ok(())
    }
}

impl LeafItem for TextItem {
    fn composer(&self, cache: &ComposerCache) -> Option<Arc<dyn LeafPaint>> {
        let ascent = self.metrics.map_or(0, |m| m.ascent);
        let key = CacheKey::of(&("text", &self.text, &self.color, &self.font, ascent));
        let list = cache.get_or_insert(key, || {
            let mut list = DrawList::new();
            list.text(
                self.text.clone(),
                Point::new(0, ascent),
                self.color.clone(),
                self.font.clone(),
            );
            list
        });
        Some(Arc::new(TextPaint { list }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::DrawCommand;

    struct FixedMetrics;

    impl FontMetrics for FixedMetrics {
        fn measure(&self, _font: &str, text: &str) -> TextMetrics {
            TextMetrics {
                width: 8 * text.len() as i32,
                height: 16,
                ascent: 12,
                descent: 4,
            }
        }
    }

    #[test]
    fn size_to_content_pins_the_measured_size() {
        let mut item = TextItem::new("hello");
        let sizing = item.size_to_content(&FixedMetrics);
        let c = sizing.width_constraint(1000);
        assert_eq!(c.preferred, Some(40));
        let c = sizing.height_constraint(1000);
        assert_eq!(c.preferred, Some(16));
    }

    #[test]
    fn identical_text_shares_one_cached_paint() {
        let cache = ComposerCache::new();
        let a = TextItem::new("marker");
        let b = TextItem::new("marker");
        let pa = a.composer(&cache).unwrap();
        let pb = b.composer(&cache).unwrap();
        assert_eq!(cache.len(), 1);

        let mut la = DrawList::new();
        let mut lb = DrawList::new();
        pa.paint(&mut la, Size::new(10, 10)).unwrap();
        pb.paint(&mut lb, Size::new(10, 10)).unwrap();
        assert_eq!(la.commands(), lb.commands());
    }

    #[test]
    fn text_draws_at_the_baseline() {
        let cache = ComposerCache::new();
        let mut item = TextItem::new("x");
        item.size_to_content(&FixedMetrics);
        let paint = item.composer(&cache).unwrap();
        let mut list = DrawList::new();
        paint.paint(&mut list, Size::new(10, 10)).unwrap();
        let mut origin = None;
        list.visit(&mut |cmd| {
            if let DrawCommand::Text { origin: o, .. } = cmd {
                origin = Some(*o);
            }
        });
        assert_eq!(origin, Some(Point::new(0, 12)));
    }
}
