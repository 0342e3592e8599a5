use std::collections::HashSet;
use std::rc::Rc;

use eframe::egui::{self, Align2, Color32, FontId, Painter, Rect, Sense, Stroke, Ui, vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::super::render_utils::{
    arrow_head, blend_color, circle_visible, color32, dim_color, draw_background, edge_visible,
    node_radius, world_to_screen,
};
use super::super::{SearchMatchCache, ViewModel};

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl ViewModel {
    fn cached_search_matches(&mut self) -> Option<Rc<HashSet<usize>>> {
        let query = self.search.trim();
        if query.is_empty() {
            return None;
        }

        let revision = self.scene.revision();
        if let Some(cached) = &self.search_match_cache
            && cached.scene_revision == revision
            && cached.query == query
        {
            return Some(Rc::clone(&cached.matches));
        }

        let matcher = SkimMatcherV2::default();
        let matches = self
            .scene
            .nodes()
            .iter()
            .enumerate()
            .filter(|(_, bound)| fuzzy_match_score(&matcher, &bound.datum.id, query).is_some())
            .map(|(index, _)| index)
            .collect::<HashSet<_>>();
        let matches = Rc::new(matches);

        self.search_match_cache = Some(SearchMatchCache {
            query: query.to_owned(),
            scene_revision: revision,
            matches: Rc::clone(&matches),
        });

        Some(matches)
    }

    fn draw_quadtree_overlay(&self, painter: &Painter, rect: Rect) {
        let tree = self.scene.quadtree();
        tree.visit(|_, quad, extent| {
            let min = world_to_screen(rect, self.pan, self.zoom, extent.x0, extent.y0);
            let max = world_to_screen(rect, self.pan, self.zoom, extent.x1, extent.y1);
            let alpha = if quad.is_leaf() { 90 } else { 45 };
            painter.rect_stroke(
                Rect::from_min_max(min, max),
                0.0,
                Stroke::new(1.0, Color32::from_rgba_unmultiplied(40, 120, 200, alpha)),
                egui::StrokeKind::Inside,
            );
            !circle_visible(rect, Rect::from_min_max(min, max).center(), (max.x - min.x) * 0.75)
        });
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        draw_background(&painter, rect, self.pan, self.zoom);

        self.handle_graph_zoom(ui, rect, &response);
        self.handle_graph_pan(&response);
        self.handle_node_drag(rect, &response);

        let search_matches = self.cached_search_matches();
        let search_active = search_matches
            .as_ref()
            .is_some_and(|matches| !matches.is_empty());

        if self.show_quadtree_overlay {
            self.draw_quadtree_overlay(&painter, rect);
        }

        let (pan, zoom) = (self.pan, self.zoom);
        let screen_positions = self.scene.simulation().with_nodes(|nodes| {
            nodes
                .iter()
                .map(|node| world_to_screen(rect, pan, zoom, node.x, node.y))
                .collect::<Vec<_>>()
        });
        let radius = node_radius(self.scene.config().node_radius, zoom);

        let edge_color = Color32::from_rgba_unmultiplied(90, 90, 90, 150);
        for edge in self.scene.links() {
            let (Some(&start), Some(&end)) = (
                screen_positions.get(edge.source),
                screen_positions.get(edge.target),
            ) else {
                continue;
            };
            if !edge_visible(rect, start, end, 2.0) {
                continue;
            }

            // width follows sqrt(value); the arrow points at the target
            let width = (edge.value.max(0.0).sqrt() as f32 * zoom.sqrt()).clamp(0.6, 6.0);
            painter.line_segment([start, end], Stroke::new(width, edge_color));
            if let Some(head) = arrow_head(start, end, radius, 4.0 + width * 2.0) {
                painter.add(egui::Shape::convex_polygon(head.to_vec(), edge_color, Stroke::NONE));
            }
        }

        let hovered = response
            .hover_pos()
            .and_then(|pointer| self.pick(rect, pointer))
            .or(self.drag);
        if hovered.is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::Grab);
        }

        if response.clicked_by(egui::PointerButton::Primary) {
            let selected = hovered
                .and_then(|index| self.scene.nodes().get(index))
                .map(|bound| bound.datum.id.clone());
            self.set_selected(selected);
        }

        let mut visible_node_count = 0usize;
        let highlight = Color32::from_rgb(255, 170, 40);
        for (index, bound) in self.scene.nodes().iter().enumerate() {
            let Some(&position) = screen_positions.get(index) else {
                continue;
            };
            if !circle_visible(rect, position, radius) {
                continue;
            }
            visible_node_count += 1;

            let style = self.scene.style(bound.handle);
            let is_selected = self.selected.as_deref() == Some(bound.datum.id.as_str());
            let is_hovered = hovered == Some(index);
            let is_match = search_matches
                .as_ref()
                .is_some_and(|matches| matches.contains(&index));

            let base = color32(style.fill, style.opacity);
            let fill = if is_hovered {
                blend_color(base, highlight, 0.35)
            } else if search_active && !is_match {
                dim_color(base, 0.45)
            } else {
                base
            };
            painter.circle_filled(position, radius, fill);

            let outline_alpha = (style.opacity * 255.0) as u8;
            let outline = if is_selected || is_match {
                Stroke::new(2.5, highlight.gamma_multiply(style.opacity as f32))
            } else {
                Stroke::new(1.2, Color32::from_rgba_unmultiplied(255, 165, 0, outline_alpha))
            };
            painter.circle_stroke(position, radius, outline);

            if is_selected || is_hovered || is_match || zoom > 0.6 {
                painter.text(
                    position + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    bound.datum.id.as_str(),
                    FontId::proportional(12.0),
                    Color32::from_gray(60).gamma_multiply(style.opacity as f32),
                );
            }
        }
        self.visible_node_count = visible_node_count;

        if let Some(index) = hovered
            && let Some(bound) = self.scene.nodes().get(index)
        {
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!(
                    "{}  |  group {}  |  links {}",
                    bound.datum.id,
                    bound.datum.group,
                    self.scene.degree(index)
                ),
                FontId::proportional(13.0),
                Color32::from_gray(40),
            );
        }
    }
}
