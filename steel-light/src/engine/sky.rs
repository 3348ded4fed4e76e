//! Sky light: enters at the top of each column and falls straight down without loss
//! through fully transparent blocks.
//!
//! Sections above the terrain store nothing. Updates skip through runs of unstored
//! sections, and reads of an unstored section borrow the bottom slice of the first
//! stored section above it.

use steel_utils::{Direction, SELF_SOURCE, block_pos, section_pos};

use super::{LightGraph, LightRules, MAX_LEVEL, illegal_direction, signum_delta};
use crate::block_state::LightLayer;
use crate::propagator::LevelPropagator;

/// Rules for sky light.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkyLightRules;

impl LightRules for SkyLightRules {
    const LAYER: LightLayer = LightLayer::Sky;

    fn compute_level_from_neighbor(
        graph: &mut LightGraph<'_, Self>,
        source: i64,
        target: i64,
        level: u8,
    ) -> u8 {
        if target == SELF_SOURCE || source == SELF_SOURCE {
            return MAX_LEVEL;
        }
        if level >= MAX_LEVEL {
            return level;
        }
        let (target_state, opacity) = graph.state_and_opacity(target);
        if opacity >= MAX_LEVEL {
            return MAX_LEVEL;
        }
        let (dx, dy, dz) = signum_delta(source, target);
        let (source_state, _) = graph.state_and_opacity(source);
        match Direction::from_normal(dx, dy, dz) {
            Some(dir) => {
                if source_state.occludes_face(dir, &target_state) {
                    return MAX_LEVEL;
                }
            }
            None => {
                // A sideways step combined with a drop through unstored sections.
                let side = match (dy, Direction::from_normal(dx, 0, dz)) {
                    (-1, Some(side)) => side,
                    _ => illegal_direction(dx, dy, dz),
                };
                if source_state.face_shape(Direction::Down).is_full()
                    || target_state.face_shape(side.opposite()).is_full()
                {
                    return MAX_LEVEL;
                }
            }
        }
        let straight_down = block_pos::x(source) == block_pos::x(target)
            && block_pos::z(source) == block_pos::z(target)
            && block_pos::y(source) > block_pos::y(target);
        if straight_down && level == 0 && opacity == 0 {
            0
        } else {
            level + opacity.max(1)
        }
    }

    fn get_computed_level(
        graph: &mut LightGraph<'_, Self>,
        id: i64,
        excluded: i64,
        max_level: u8,
    ) -> u8 {
        let mut best = max_level;
        for dir in Direction::ALL {
            let neighbor = block_pos::offset_dir(id, dir);
            if neighbor == excluded {
                continue;
            }
            let level = match graph.stored_level(neighbor) {
                Some(level) => level,
                None if dir == Direction::Down => continue,
                None => MAX_LEVEL - graph.storage().updating_sky_light(neighbor),
            };
            best = best.min(Self::compute_level_from_neighbor(graph, neighbor, id, level));
            if best == 0 {
                return best;
            }
        }
        best
    }

    fn check_neighbors_after_update(
        graph: &mut LightGraph<'_, Self>,
        propagator: &mut LevelPropagator,
        id: i64,
        level: u8,
        decrease: bool,
    ) {
        let section = section_pos::block_to_section(id);
        let y = block_pos::y(id);
        let skipped_sections = if section_pos::section_relative(y) == 0 {
            let section_y = section_pos::block_to_section_coord(y);
            let mut n = 0;
            while !graph
                .storage()
                .storing_light_for_section(section_pos::offset(section, 0, -n - 1, 0))
                && graph.storage().has_sections_below(section_y - n - 1)
            {
                n += 1;
            }
            n
        } else {
            0
        };

        let below = block_pos::offset(id, 0, -1 - skipped_sections * 16, 0);
        let below_section = section_pos::block_to_section(below);
        if section == below_section || graph.storage().storing_light_for_section(below_section) {
            propagator.check_neighbor(graph, id, below, level, decrease);
        }

        let above = block_pos::offset_dir(id, Direction::Up);
        let above_section = section_pos::block_to_section(above);
        if section == above_section || graph.storage().storing_light_for_section(above_section) {
            propagator.check_neighbor(graph, id, above, level, decrease);
        }

        for dir in Direction::HORIZONTALS {
            let (dx, _, dz) = dir.offset();
            let mut drop = 0;
            loop {
                let neighbor = block_pos::offset(id, dx, -drop, dz);
                let neighbor_section = section_pos::block_to_section(neighbor);
                if section == neighbor_section {
                    propagator.check_neighbor(graph, id, neighbor, level, decrease);
                    break;
                }
                // Below the first step this is a sideways move plus a drop through the
                // skipped sections of this column.
                if graph.storage().storing_light_for_section(neighbor_section) {
                    propagator.check_neighbor(graph, id, neighbor, level, decrease);
                }
                drop += 1;
                if drop > skipped_sections * 16 {
                    break;
                }
            }
        }
    }

    fn check_node(graph: &mut LightGraph<'_, Self>, propagator: &mut LevelPropagator, id: i64) {
        graph.storage.run_all_updates();
        let mut section = section_pos::block_to_section(id);
        if graph.storage().storing_light_for_section(section) {
            propagator.check_node(graph, id);
            return;
        }
        let mut id = block_pos::flat_index(id);
        while !graph.storage().storing_light_for_section(section)
            && !graph.storage().is_above_data(section)
        {
            section = section_pos::offset(section, 0, 1, 0);
            id = block_pos::offset(id, 0, 16, 0);
        }
        if graph.storage().storing_light_for_section(section) {
            propagator.check_node(graph, id);
        }
    }
}
