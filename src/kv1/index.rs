//! Composite-key index over [`Kv1Records`] and the reference linker.
//!
//! The index maps each record's key to its position in the owning vector,
//! for every record type except `NoticeAssignment` (which has no key). The
//! linker derives foreign keys from each record's own key and attributes and
//! fills the `Option<usize>` back-references; a missing referent is simply
//! left `None`.

use crate::kv1::types::*;
use ahash::AHashMap;

macro_rules! build_map {
    ($records:expr, $dups:expr) => {{
        let mut map = AHashMap::with_capacity($records.len());
        for (i, record) in $records.iter().enumerate() {
            // Last write wins on duplicate keys; valid KV1 has none, so the
            // count is surfaced to the caller.
            if map.insert(record.key.clone(), i).is_some() {
                $dups += 1;
            }
        }
        map
    }};
}

#[derive(Debug, Default)]
pub struct Kv1Index {
    pub organizational_units: AHashMap<Kv1OrganizationalUnitKey, usize>,
    pub higher_organizational_units: AHashMap<Kv1HigherOrganizationalUnitKey, usize>,
    pub user_stop_points: AHashMap<Kv1UserStopPointKey, usize>,
    pub user_stop_areas: AHashMap<Kv1UserStopAreaKey, usize>,
    pub timing_links: AHashMap<Kv1TimingLinkKey, usize>,
    pub links: AHashMap<Kv1LinkKey, usize>,
    pub lines: AHashMap<Kv1LineKey, usize>,
    pub destinations: AHashMap<Kv1DestinationKey, usize>,
    pub journey_patterns: AHashMap<Kv1JourneyPatternKey, usize>,
    pub concession_financer_relations: AHashMap<Kv1ConcessionFinancerRelationKey, usize>,
    pub concession_areas: AHashMap<Kv1ConcessionAreaKey, usize>,
    pub financers: AHashMap<Kv1FinancerKey, usize>,
    pub journey_pattern_timing_links: AHashMap<Kv1JourneyPatternTimingLinkKey, usize>,
    pub points: AHashMap<Kv1PointKey, usize>,
    pub point_on_links: AHashMap<Kv1PointOnLinkKey, usize>,
    pub icons: AHashMap<Kv1IconKey, usize>,
    pub notices: AHashMap<Kv1NoticeKey, usize>,
    pub time_demand_groups: AHashMap<Kv1TimeDemandGroupKey, usize>,
    pub time_demand_group_run_times: AHashMap<Kv1TimeDemandGroupRunTimeKey, usize>,
    pub period_groups: AHashMap<Kv1PeriodGroupKey, usize>,
    pub specific_days: AHashMap<Kv1SpecificDayKey, usize>,
    pub timetable_versions: AHashMap<Kv1TimetableVersionKey, usize>,
    pub public_journeys: AHashMap<Kv1PublicJourneyKey, usize>,
    pub period_group_validities: AHashMap<Kv1PeriodGroupValidityKey, usize>,
    pub exceptional_operating_days: AHashMap<Kv1ExceptionalOperatingDayKey, usize>,
    pub schedule_versions: AHashMap<Kv1ScheduleVersionKey, usize>,
    pub public_journey_passing_times: AHashMap<Kv1PublicJourneyPassingTimesKey, usize>,
    pub operating_days: AHashMap<Kv1OperatingDayKey, usize>,

    /// Number of key collisions encountered while building. Zero for valid
    /// KV1 input.
    pub duplicate_keys: usize,
}

impl Kv1Index {
    pub fn build(records: &Kv1Records) -> Kv1Index {
        let mut dups = 0usize;
        let index = Kv1Index {
            organizational_units: build_map!(records.organizational_units, dups),
            higher_organizational_units: build_map!(records.higher_organizational_units, dups),
            user_stop_points: build_map!(records.user_stop_points, dups),
            user_stop_areas: build_map!(records.user_stop_areas, dups),
            timing_links: build_map!(records.timing_links, dups),
            links: build_map!(records.links, dups),
            lines: build_map!(records.lines, dups),
            destinations: build_map!(records.destinations, dups),
            journey_patterns: build_map!(records.journey_patterns, dups),
            concession_financer_relations: build_map!(records.concession_financer_relations, dups),
            concession_areas: build_map!(records.concession_areas, dups),
            financers: build_map!(records.financers, dups),
            journey_pattern_timing_links: build_map!(records.journey_pattern_timing_links, dups),
            points: build_map!(records.points, dups),
            point_on_links: build_map!(records.point_on_links, dups),
            icons: build_map!(records.icons, dups),
            notices: build_map!(records.notices, dups),
            time_demand_groups: build_map!(records.time_demand_groups, dups),
            time_demand_group_run_times: build_map!(records.time_demand_group_run_times, dups),
            period_groups: build_map!(records.period_groups, dups),
            specific_days: build_map!(records.specific_days, dups),
            timetable_versions: build_map!(records.timetable_versions, dups),
            public_journeys: build_map!(records.public_journeys, dups),
            period_group_validities: build_map!(records.period_group_validities, dups),
            exceptional_operating_days: build_map!(records.exceptional_operating_days, dups),
            schedule_versions: build_map!(records.schedule_versions, dups),
            public_journey_passing_times: build_map!(records.public_journey_passing_times, dups),
            operating_days: build_map!(records.operating_days, dups),
            duplicate_keys: 0,
        };
        Kv1Index {
            duplicate_keys: dups,
            ..index
        }
    }

    /// Sum of all per-type map sizes. With no duplicate keys this equals
    /// `records.total() - records.notice_assignments.len()`.
    pub fn total(&self) -> usize {
        self.organizational_units.len()
            + self.higher_organizational_units.len()
            + self.user_stop_points.len()
            + self.user_stop_areas.len()
            + self.timing_links.len()
            + self.links.len()
            + self.lines.len()
            + self.destinations.len()
            + self.journey_patterns.len()
            + self.concession_financer_relations.len()
            + self.concession_areas.len()
            + self.financers.len()
            + self.journey_pattern_timing_links.len()
            + self.points.len()
            + self.point_on_links.len()
            + self.icons.len()
            + self.notices.len()
            + self.time_demand_groups.len()
            + self.time_demand_group_run_times.len()
            + self.period_groups.len()
            + self.specific_days.len()
            + self.timetable_versions.len()
            + self.public_journeys.len()
            + self.period_group_validities.len()
            + self.exceptional_operating_days.len()
            + self.schedule_versions.len()
            + self.public_journey_passing_times.len()
            + self.operating_days.len()
    }

    /// Per-type index sizes, for census logging.
    pub fn census(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("organizational_units", self.organizational_units.len()),
            ("higher_organizational_units", self.higher_organizational_units.len()),
            ("user_stop_points", self.user_stop_points.len()),
            ("user_stop_areas", self.user_stop_areas.len()),
            ("timing_links", self.timing_links.len()),
            ("links", self.links.len()),
            ("lines", self.lines.len()),
            ("destinations", self.destinations.len()),
            ("journey_patterns", self.journey_patterns.len()),
            ("concession_financer_relations", self.concession_financer_relations.len()),
            ("concession_areas", self.concession_areas.len()),
            ("financers", self.financers.len()),
            ("journey_pattern_timing_links", self.journey_pattern_timing_links.len()),
            ("points", self.points.len()),
            ("point_on_links", self.point_on_links.len()),
            ("icons", self.icons.len()),
            ("notices", self.notices.len()),
            ("time_demand_groups", self.time_demand_groups.len()),
            ("time_demand_group_run_times", self.time_demand_group_run_times.len()),
            ("period_groups", self.period_groups.len()),
            ("specific_days", self.specific_days.len()),
            ("timetable_versions", self.timetable_versions.len()),
            ("public_journeys", self.public_journeys.len()),
            ("period_group_validities", self.period_group_validities.len()),
            ("exceptional_operating_days", self.exceptional_operating_days.len()),
            ("schedule_versions", self.schedule_versions.len()),
            ("public_journey_passing_times", self.public_journey_passing_times.len()),
            ("operating_days", self.operating_days.len()),
        ]
    }
}

/// Fills every record's resolved references by looking up the foreign keys
/// derivable from its own key and attributes. Never fails: an absent
/// referent leaves the reference `None`.
pub fn link_records(records: &mut Kv1Records, index: &Kv1Index) {
    for orunorun in &mut records.higher_organizational_units {
        orunorun.organizational_unit_parent = index
            .organizational_units
            .get(&Kv1OrganizationalUnitKey {
                data_owner_code: orunorun.key.data_owner_code.clone(),
                organizational_unit_code: orunorun.key.organizational_unit_code_parent.clone(),
            })
            .copied();
        orunorun.organizational_unit_child = index
            .organizational_units
            .get(&Kv1OrganizationalUnitKey {
                data_owner_code: orunorun.key.data_owner_code.clone(),
                organizational_unit_code: orunorun.key.organizational_unit_code_child.clone(),
            })
            .copied();
    }

    for usrstop in &mut records.user_stop_points {
        usrstop.point = index
            .points
            .get(&Kv1PointKey {
                data_owner_code: usrstop.key.data_owner_code.clone(),
                point_code: usrstop.key.user_stop_code.clone(),
            })
            .copied();
        if !usrstop.user_stop_area_code.is_empty() {
            usrstop.user_stop_area = index
                .user_stop_areas
                .get(&Kv1UserStopAreaKey {
                    data_owner_code: usrstop.key.data_owner_code.clone(),
                    user_stop_area_code: usrstop.user_stop_area_code.clone(),
                })
                .copied();
        }
    }

    for tili in &mut records.timing_links {
        tili.user_stop_begin = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: tili.key.data_owner_code.clone(),
                user_stop_code: tili.key.user_stop_code_begin.clone(),
            })
            .copied();
        tili.user_stop_end = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: tili.key.data_owner_code.clone(),
                user_stop_code: tili.key.user_stop_code_end.clone(),
            })
            .copied();
    }

    for link in &mut records.links {
        link.user_stop_begin = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: link.key.data_owner_code.clone(),
                user_stop_code: link.key.user_stop_code_begin.clone(),
            })
            .copied();
        link.user_stop_end = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: link.key.data_owner_code.clone(),
                user_stop_code: link.key.user_stop_code_end.clone(),
            })
            .copied();
    }

    for line in &mut records.lines {
        if let Some(icon_number) = line.line_icon {
            line.icon = index
                .icons
                .get(&Kv1IconKey {
                    data_owner_code: line.key.data_owner_code.clone(),
                    icon_number,
                })
                .copied();
        }
    }

    for jopa in &mut records.journey_patterns {
        jopa.line = index
            .lines
            .get(&Kv1LineKey {
                data_owner_code: jopa.key.data_owner_code.clone(),
                line_planning_number: jopa.key.line_planning_number.clone(),
            })
            .copied();
    }

    for confinrel in &mut records.concession_financer_relations {
        confinrel.concession_area = index
            .concession_areas
            .get(&Kv1ConcessionAreaKey {
                data_owner_code: confinrel.key.data_owner_code.clone(),
                concession_area_code: confinrel.concession_area_code.clone(),
            })
            .copied();
        if !confinrel.financer_code.is_empty() {
            confinrel.financer = index
                .financers
                .get(&Kv1FinancerKey {
                    data_owner_code: confinrel.key.data_owner_code.clone(),
                    financer_code: confinrel.financer_code.clone(),
                })
                .copied();
        }
    }

    for jopatili in &mut records.journey_pattern_timing_links {
        let dac = &jopatili.key.data_owner_code;
        jopatili.line = index
            .lines
            .get(&Kv1LineKey {
                data_owner_code: dac.clone(),
                line_planning_number: jopatili.key.line_planning_number.clone(),
            })
            .copied();
        jopatili.journey_pattern = index
            .journey_patterns
            .get(&Kv1JourneyPatternKey {
                data_owner_code: dac.clone(),
                line_planning_number: jopatili.key.line_planning_number.clone(),
                journey_pattern_code: jopatili.key.journey_pattern_code.clone(),
            })
            .copied();
        jopatili.user_stop_begin = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: dac.clone(),
                user_stop_code: jopatili.user_stop_code_begin.clone(),
            })
            .copied();
        jopatili.user_stop_end = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: dac.clone(),
                user_stop_code: jopatili.user_stop_code_end.clone(),
            })
            .copied();
        jopatili.con_fin_rel = index
            .concession_financer_relations
            .get(&Kv1ConcessionFinancerRelationKey {
                data_owner_code: dac.clone(),
                con_fin_rel_code: jopatili.con_fin_rel_code.clone(),
            })
            .copied();
        jopatili.dest = index
            .destinations
            .get(&Kv1DestinationKey {
                data_owner_code: dac.clone(),
                dest_code: jopatili.dest_code.clone(),
            })
            .copied();
        if let Some(icon_number) = jopatili.line_dest_icon {
            jopatili.icon = index
                .icons
                .get(&Kv1IconKey {
                    data_owner_code: dac.clone(),
                    icon_number,
                })
                .copied();
        }
    }

    for pool in &mut records.point_on_links {
        pool.user_stop_begin = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: pool.key.data_owner_code.clone(),
                user_stop_code: pool.key.user_stop_code_begin.clone(),
            })
            .copied();
        pool.user_stop_end = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: pool.key.data_owner_code.clone(),
                user_stop_code: pool.key.user_stop_code_end.clone(),
            })
            .copied();
        pool.point = index
            .points
            .get(&Kv1PointKey {
                data_owner_code: pool.key.point_data_owner_code.clone(),
                point_code: pool.key.point_code.clone(),
            })
            .copied();
    }

    for ntcassgnm in &mut records.notice_assignments {
        ntcassgnm.notice = index
            .notices
            .get(&Kv1NoticeKey {
                data_owner_code: ntcassgnm.data_owner_code.clone(),
                notice_code: ntcassgnm.notice_code.clone(),
            })
            .copied();
    }

    for timdemgrp in &mut records.time_demand_groups {
        timdemgrp.line = index
            .lines
            .get(&Kv1LineKey {
                data_owner_code: timdemgrp.key.data_owner_code.clone(),
                line_planning_number: timdemgrp.key.line_planning_number.clone(),
            })
            .copied();
        timdemgrp.journey_pattern = index
            .journey_patterns
            .get(&Kv1JourneyPatternKey {
                data_owner_code: timdemgrp.key.data_owner_code.clone(),
                line_planning_number: timdemgrp.key.line_planning_number.clone(),
                journey_pattern_code: timdemgrp.key.journey_pattern_code.clone(),
            })
            .copied();
    }

    for timdemrnt in &mut records.time_demand_group_run_times {
        let dac = &timdemrnt.key.data_owner_code;
        timdemrnt.line = index
            .lines
            .get(&Kv1LineKey {
                data_owner_code: dac.clone(),
                line_planning_number: timdemrnt.key.line_planning_number.clone(),
            })
            .copied();
        timdemrnt.user_stop_begin = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: dac.clone(),
                user_stop_code: timdemrnt.user_stop_code_begin.clone(),
            })
            .copied();
        timdemrnt.user_stop_end = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: dac.clone(),
                user_stop_code: timdemrnt.user_stop_code_end.clone(),
            })
            .copied();
        timdemrnt.journey_pattern = index
            .journey_patterns
            .get(&Kv1JourneyPatternKey {
                data_owner_code: dac.clone(),
                line_planning_number: timdemrnt.key.line_planning_number.clone(),
                journey_pattern_code: timdemrnt.key.journey_pattern_code.clone(),
            })
            .copied();
        timdemrnt.time_demand_group = index
            .time_demand_groups
            .get(&Kv1TimeDemandGroupKey {
                data_owner_code: dac.clone(),
                line_planning_number: timdemrnt.key.line_planning_number.clone(),
                journey_pattern_code: timdemrnt.key.journey_pattern_code.clone(),
                time_demand_group_code: timdemrnt.key.time_demand_group_code.clone(),
            })
            .copied();
        timdemrnt.journey_pattern_timing_link = index
            .journey_pattern_timing_links
            .get(&Kv1JourneyPatternTimingLinkKey {
                data_owner_code: dac.clone(),
                line_planning_number: timdemrnt.key.line_planning_number.clone(),
                journey_pattern_code: timdemrnt.key.journey_pattern_code.clone(),
                timing_link_order: timdemrnt.key.timing_link_order,
            })
            .copied();
    }

    for tive in &mut records.timetable_versions {
        tive.organizational_unit = index
            .organizational_units
            .get(&Kv1OrganizationalUnitKey {
                data_owner_code: tive.key.data_owner_code.clone(),
                organizational_unit_code: tive.key.organizational_unit_code.clone(),
            })
            .copied();
        tive.period_group = index
            .period_groups
            .get(&Kv1PeriodGroupKey {
                data_owner_code: tive.key.data_owner_code.clone(),
                period_group_code: tive.key.period_group_code.clone(),
            })
            .copied();
        tive.specific_day = index
            .specific_days
            .get(&Kv1SpecificDayKey {
                data_owner_code: tive.key.data_owner_code.clone(),
                specific_day_code: tive.key.specific_day_code.clone(),
            })
            .copied();
    }

    for pujo in &mut records.public_journeys {
        let dac = &pujo.key.data_owner_code;
        pujo.timetable_version = index
            .timetable_versions
            .get(&Kv1TimetableVersionKey {
                data_owner_code: dac.clone(),
                organizational_unit_code: pujo.key.organizational_unit_code.clone(),
                timetable_version_code: pujo.key.timetable_version_code.clone(),
                period_group_code: pujo.key.period_group_code.clone(),
                specific_day_code: pujo.key.specific_day_code.clone(),
            })
            .copied();
        pujo.organizational_unit = index
            .organizational_units
            .get(&Kv1OrganizationalUnitKey {
                data_owner_code: dac.clone(),
                organizational_unit_code: pujo.key.organizational_unit_code.clone(),
            })
            .copied();
        pujo.period_group = index
            .period_groups
            .get(&Kv1PeriodGroupKey {
                data_owner_code: dac.clone(),
                period_group_code: pujo.key.period_group_code.clone(),
            })
            .copied();
        pujo.specific_day = index
            .specific_days
            .get(&Kv1SpecificDayKey {
                data_owner_code: dac.clone(),
                specific_day_code: pujo.key.specific_day_code.clone(),
            })
            .copied();
        pujo.line = index
            .lines
            .get(&Kv1LineKey {
                data_owner_code: dac.clone(),
                line_planning_number: pujo.key.line_planning_number.clone(),
            })
            .copied();
        pujo.time_demand_group = index
            .time_demand_groups
            .get(&Kv1TimeDemandGroupKey {
                data_owner_code: dac.clone(),
                line_planning_number: pujo.key.line_planning_number.clone(),
                journey_pattern_code: pujo.journey_pattern_code.clone(),
                time_demand_group_code: pujo.time_demand_group_code.clone(),
            })
            .copied();
        pujo.journey_pattern = index
            .journey_patterns
            .get(&Kv1JourneyPatternKey {
                data_owner_code: dac.clone(),
                line_planning_number: pujo.key.line_planning_number.clone(),
                journey_pattern_code: pujo.journey_pattern_code.clone(),
            })
            .copied();
    }

    for pegrval in &mut records.period_group_validities {
        pegrval.organizational_unit = index
            .organizational_units
            .get(&Kv1OrganizationalUnitKey {
                data_owner_code: pegrval.key.data_owner_code.clone(),
                organizational_unit_code: pegrval.key.organizational_unit_code.clone(),
            })
            .copied();
        pegrval.period_group = index
            .period_groups
            .get(&Kv1PeriodGroupKey {
                data_owner_code: pegrval.key.data_owner_code.clone(),
                period_group_code: pegrval.key.period_group_code.clone(),
            })
            .copied();
    }

    for excopday in &mut records.exceptional_operating_days {
        excopday.organizational_unit = index
            .organizational_units
            .get(&Kv1OrganizationalUnitKey {
                data_owner_code: excopday.key.data_owner_code.clone(),
                organizational_unit_code: excopday.key.organizational_unit_code.clone(),
            })
            .copied();
        excopday.specific_day = index
            .specific_days
            .get(&Kv1SpecificDayKey {
                data_owner_code: excopday.key.data_owner_code.clone(),
                specific_day_code: excopday.specific_day_code.clone(),
            })
            .copied();
        if !excopday.period_group_code.is_empty() {
            excopday.period_group = index
                .period_groups
                .get(&Kv1PeriodGroupKey {
                    data_owner_code: excopday.key.data_owner_code.clone(),
                    period_group_code: excopday.period_group_code.clone(),
                })
                .copied();
        }
    }

    for schedvers in &mut records.schedule_versions {
        schedvers.organizational_unit = index
            .organizational_units
            .get(&Kv1OrganizationalUnitKey {
                data_owner_code: schedvers.key.data_owner_code.clone(),
                organizational_unit_code: schedvers.key.organizational_unit_code.clone(),
            })
            .copied();
    }

    for pujopass in &mut records.public_journey_passing_times {
        let dac = &pujopass.key.data_owner_code;
        pujopass.organizational_unit = index
            .organizational_units
            .get(&Kv1OrganizationalUnitKey {
                data_owner_code: dac.clone(),
                organizational_unit_code: pujopass.key.organizational_unit_code.clone(),
            })
            .copied();
        pujopass.schedule_version = index
            .schedule_versions
            .get(&Kv1ScheduleVersionKey {
                data_owner_code: dac.clone(),
                organizational_unit_code: pujopass.key.organizational_unit_code.clone(),
                schedule_code: pujopass.key.schedule_code.clone(),
                schedule_type_code: pujopass.key.schedule_type_code.clone(),
            })
            .copied();
        pujopass.line = index
            .lines
            .get(&Kv1LineKey {
                data_owner_code: dac.clone(),
                line_planning_number: pujopass.key.line_planning_number.clone(),
            })
            .copied();
        pujopass.journey_pattern = index
            .journey_patterns
            .get(&Kv1JourneyPatternKey {
                data_owner_code: dac.clone(),
                line_planning_number: pujopass.key.line_planning_number.clone(),
                journey_pattern_code: pujopass.journey_pattern_code.clone(),
            })
            .copied();
        pujopass.user_stop = index
            .user_stop_points
            .get(&Kv1UserStopPointKey {
                data_owner_code: dac.clone(),
                user_stop_code: pujopass.user_stop_code.clone(),
            })
            .copied();
    }

    for operday in &mut records.operating_days {
        operday.organizational_unit = index
            .organizational_units
            .get(&Kv1OrganizationalUnitKey {
                data_owner_code: operday.key.data_owner_code.clone(),
                organizational_unit_code: operday.key.organizational_unit_code.clone(),
            })
            .copied();
        operday.schedule_version = index
            .schedule_versions
            .get(&Kv1ScheduleVersionKey {
                data_owner_code: operday.key.data_owner_code.clone(),
                organizational_unit_code: operday.key.organizational_unit_code.clone(),
                schedule_code: operday.key.schedule_code.clone(),
                schedule_type_code: operday.key.schedule_type_code.clone(),
            })
            .copied();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv1::testutil::fixture;

    #[test]
    fn index_completeness() {
        let records = fixture();
        let index = Kv1Index::build(&records);
        assert_eq!(index.duplicate_keys, 0);
        assert_eq!(
            index.total() + records.notice_assignments.len(),
            records.total()
        );
    }

    #[test]
    fn duplicate_keys_are_surfaced() {
        let mut records = fixture();
        let dup = records.lines[0].clone();
        records.lines.push(dup);
        let index = Kv1Index::build(&records);
        assert_eq!(index.duplicate_keys, 1);
        // Last write wins.
        assert_eq!(index.lines[&records.lines[0].key], 1);
    }

    #[test]
    fn linker_resolves_forward_references() {
        let mut records = fixture();
        let index = Kv1Index::build(&records);
        link_records(&mut records, &index);

        let stop_a = &records.user_stop_points[0];
        let point = stop_a.point.expect("stop A should resolve its point");
        assert_eq!(records.points[point].key.point_code, stop_a.key.user_stop_code);
        let area = stop_a.user_stop_area.expect("stop A is in an area");
        assert_eq!(records.user_stop_areas[area].key.user_stop_area_code, "UT001");
        // Stop B has no area code and must stay unresolved.
        assert_eq!(records.user_stop_points[1].user_stop_area, None);

        let jopatili = &records.journey_pattern_timing_links[0];
        assert_eq!(records.lines[jopatili.line.unwrap()].key.line_planning_number, "M300");
        assert_eq!(
            records.journey_patterns[jopatili.journey_pattern.unwrap()]
                .key
                .journey_pattern_code,
            "1001"
        );
        assert_eq!(
            records.user_stop_points[jopatili.user_stop_begin.unwrap()]
                .key
                .user_stop_code,
            "10001"
        );
        assert_eq!(records.destinations[jopatili.dest.unwrap()].key.dest_code, "D1");
        assert_eq!(records.icons[jopatili.icon.unwrap()].key.icon_number, 1);
        // The second link carries no icon reference.
        assert_eq!(records.journey_pattern_timing_links[1].icon, None);

        let pujo = &records.public_journeys[0];
        assert!(pujo.timetable_version.is_some());
        assert!(pujo.time_demand_group.is_some());
        assert!(pujo.journey_pattern.is_some());

        let timdemrnt = &records.time_demand_group_run_times[0];
        assert_eq!(
            records.journey_pattern_timing_links[timdemrnt.journey_pattern_timing_link.unwrap()]
                .key
                .timing_link_order,
            1
        );

        let pujopass = &records.public_journey_passing_times[0];
        assert!(pujopass.schedule_version.is_some());
        assert_eq!(
            records.user_stop_points[pujopass.user_stop.unwrap()].key.user_stop_code,
            "10001"
        );

        let operday = &records.operating_days[0];
        assert!(operday.schedule_version.is_some());

        let ntcassgnm = &records.notice_assignments[0];
        assert_eq!(records.notices[ntcassgnm.notice.unwrap()].key.notice_code, "N1");
    }

    #[test]
    fn missing_referents_stay_unresolved() {
        let mut records = fixture();
        // Remove every point; stop references must come out as None.
        records.points.clear();
        let index = Kv1Index::build(&records);
        link_records(&mut records, &index);
        assert!(records.user_stop_points.iter().all(|s| s.point.is_none()));
        // Soundness: every resolved reference points at a record whose key
        // matches the derived foreign key.
        for link in &records.links {
            if let Some(i) = link.user_stop_begin {
                assert_eq!(
                    records.user_stop_points[i].key.user_stop_code,
                    link.key.user_stop_code_begin
                );
            }
        }
    }
}
