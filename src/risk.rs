//! # Rule-Table Risk Scoring
//!
//! Scores a segment from 1 (benign) to 5 (severe) and predicts the injuries most likely
//! to occur there.
//!
//! ## Algorithm
//! 1. Decide which [`RiskFactor`]s fire for the segment ([`RiskSignals::fired_factors`])
//! 2. `risk = clamp(1 + sum of the weights of fired factors, 1, 5)`
//! 3. Every [`InjuryRule`] whose factors all fired and whose risk band contains the final
//!    score adds likelihood points to its injuries
//! 4. Injuries are ordered by points (descending), ties by declaration order of [`Injury`]
//!
//! The whole table is data: [`RuleTable::v1`] is the built-in version, and a tuned table
//! can be loaded from JSON with [`RuleTable::from_json_str`].

use crate::config::{PipelineConfig, RiskThresholds};
use crate::error::{Result, RiskError};
use crate::rider::RiderContext;
use crate::segmenter::SegmentGeometry;
use crate::surface::StreetSurface;
use crate::weather::WeatherReading;
use crate::Terrain;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Version number of the built-in rule table.
pub const RULE_TABLE_VERSION: u32 = 1;

pub const MIN_RISK: u8 = 1;
pub const MAX_RISK: u8 = 5;

/// Largest magnitude a single factor weight may have.
pub const MAX_FACTOR_WEIGHT: i32 = 5;

// =============================================================================
// Factors and Injuries
// =============================================================================

/// A condition that can raise (or lower) a segment's risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    SteepAscent,
    SteepDescent,
    SharpCurve,
    ColdTemperature,
    StrongWind,
    Precipitation,
    AdverseCondition,
    IrregularSurface,
    Nighttime,
    MassStart,
    LargeField,
    NoHelmet,
    NoProtectors,
    NoviceRider,
    ExperiencedRider,
    YoungRider,
    SeniorRider,
    CarbonFrame,
    OveruseKnee,
    BackPain,
    GravityDiscipline,
}

impl RiskFactor {
    /// Every factor, in evaluation order.
    pub const ALL: [RiskFactor; 21] = [
        RiskFactor::SteepAscent,
        RiskFactor::SteepDescent,
        RiskFactor::SharpCurve,
        RiskFactor::ColdTemperature,
        RiskFactor::StrongWind,
        RiskFactor::Precipitation,
        RiskFactor::AdverseCondition,
        RiskFactor::IrregularSurface,
        RiskFactor::Nighttime,
        RiskFactor::MassStart,
        RiskFactor::LargeField,
        RiskFactor::NoHelmet,
        RiskFactor::NoProtectors,
        RiskFactor::NoviceRider,
        RiskFactor::ExperiencedRider,
        RiskFactor::YoungRider,
        RiskFactor::SeniorRider,
        RiskFactor::CarbonFrame,
        RiskFactor::OveruseKnee,
        RiskFactor::BackPain,
        RiskFactor::GravityDiscipline,
    ];

    /// Short human-readable reason, used in map popups and reports.
    pub fn label(&self) -> &'static str {
        match self {
            RiskFactor::SteepAscent => "steep climb",
            RiskFactor::SteepDescent => "steep descent",
            RiskFactor::SharpCurve => "sharp curve",
            RiskFactor::ColdTemperature => "cold",
            RiskFactor::StrongWind => "strong wind",
            RiskFactor::Precipitation => "rain",
            RiskFactor::AdverseCondition => "adverse weather",
            RiskFactor::IrregularSurface => "irregular surface",
            RiskFactor::Nighttime => "darkness",
            RiskFactor::MassStart => "mass start",
            RiskFactor::LargeField => "large field",
            RiskFactor::NoHelmet => "no helmet",
            RiskFactor::NoProtectors => "no protectors",
            RiskFactor::NoviceRider => "inexperienced rider",
            RiskFactor::ExperiencedRider => "experienced rider",
            RiskFactor::YoungRider => "young rider",
            RiskFactor::SeniorRider => "senior rider",
            RiskFactor::CarbonFrame => "carbon frame",
            RiskFactor::OveruseKnee => "knee overuse history",
            RiskFactor::BackPain => "back pain history",
            RiskFactor::GravityDiscipline => "gravity discipline",
        }
    }

    /// Whether this factor fires for the given signals.
    pub fn fires(&self, s: &RiskSignals<'_>, t: &RiskThresholds) -> bool {
        let rider = s.rider;
        match self {
            RiskFactor::SteepAscent => s.slope > t.steep_slope_pct,
            RiskFactor::SteepDescent => s.slope < -t.steep_slope_pct,
            RiskFactor::SharpCurve => s.sharp_curve,
            RiskFactor::ColdTemperature => s.weather.temperature <= t.cold_temperature_c,
            RiskFactor::StrongWind => s.weather.wind_speed >= t.strong_wind_kmh,
            RiskFactor::Precipitation => s.weather.precip >= t.precipitation_mm,
            RiskFactor::AdverseCondition => s.weather.classify().is_adverse(),
            RiskFactor::IrregularSurface => s.surface.is_irregular(),
            RiskFactor::Nighttime => s.nighttime,
            RiskFactor::MassStart => rider.mass_start,
            RiskFactor::LargeField => rider.participants > t.large_field_participants,
            RiskFactor::NoHelmet => !rider.equipment.helmet,
            RiskFactor::NoProtectors => {
                !rider.equipment.protectors && rider.race_type.map_or(false, |r| r.is_offroad())
            }
            RiskFactor::NoviceRider => rider.rider_type.is_novice(),
            RiskFactor::ExperiencedRider => rider.rider_type.is_experienced(),
            RiskFactor::YoungRider => rider.age < t.young_rider_age,
            RiskFactor::SeniorRider => rider.age >= t.senior_rider_age,
            RiskFactor::CarbonFrame => rider.material == crate::rider::FrameMaterial::Carbon,
            RiskFactor::OveruseKnee => rider.overuse_knee,
            RiskFactor::BackPain => rider.back_pain,
            RiskFactor::GravityDiscipline => rider.race_type.map_or(false, |r| r.is_gravity()),
        }
    }
}

/// Injury kinds, declared from most to least common so ties sort sensibly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Injury {
    Abrasion,
    Contusion,
    ClavicleFracture,
    WristInjury,
    HeadInjury,
    KneeStrain,
    BackStrain,
    PelvicFracture,
    SpinalInjury,
    Hypothermia,
    SevereTorsoInjury,
}

impl Injury {
    pub fn label(&self) -> &'static str {
        match self {
            Injury::Abrasion => "abrasions",
            Injury::Contusion => "contusions",
            Injury::ClavicleFracture => "clavicle fracture",
            Injury::WristInjury => "wrist injury",
            Injury::HeadInjury => "head injury",
            Injury::KneeStrain => "knee strain",
            Injury::BackStrain => "back strain",
            Injury::PelvicFracture => "pelvic fracture",
            Injury::SpinalInjury => "spinal injury",
            Injury::Hypothermia => "hypothermia",
            Injury::SevereTorsoInjury => "severe back/organ injuries",
        }
    }
}

// =============================================================================
// Signals
// =============================================================================

/// Everything the rules look at for one segment.
#[derive(Debug, Clone, Copy)]
pub struct RiskSignals<'a> {
    /// Signed percent grade
    pub slope: f64,
    pub sharp_curve: bool,
    pub weather: &'a WeatherReading,
    pub nighttime: bool,
    pub surface: StreetSurface,
    pub rider: &'a RiderContext,
}

impl RiskSignals<'_> {
    /// Factors that fire, in [`RiskFactor::ALL`] order.
    pub fn fired_factors(&self, thresholds: &RiskThresholds) -> Vec<RiskFactor> {
        RiskFactor::ALL
            .iter()
            .copied()
            .filter(|f| f.fires(self, thresholds))
            .collect()
    }
}

// =============================================================================
// Rule Table
// =============================================================================

/// Weight added to the score when a factor fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorRule {
    pub factor: RiskFactor,
    pub weight: i32,
}

/// Likelihood points for one injury.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryWeight {
    pub injury: Injury,
    pub points: u32,
}

/// Injuries that become likely when all `when` factors fired and the final score is
/// within `min_risk..=max_risk`. An empty `when` always matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryRule {
    #[serde(default)]
    pub when: Vec<RiskFactor>,
    #[serde(default = "default_min_risk")]
    pub min_risk: u8,
    #[serde(default = "default_max_risk")]
    pub max_risk: u8,
    pub injuries: Vec<InjuryWeight>,
}

fn default_min_risk() -> u8 {
    MIN_RISK
}

fn default_max_risk() -> u8 {
    MAX_RISK
}

impl InjuryRule {
    fn matches(&self, fired: &[RiskFactor], risk: u8) -> bool {
        (self.min_risk..=self.max_risk).contains(&risk) && self.when.iter().all(|f| fired.contains(f))
    }
}

/// Versioned scoring table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub version: u32,
    pub factors: Vec<FactorRule>,
    pub injuries: Vec<InjuryRule>,
}

/// Result of scoring one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Clamped score, 1..=5
    pub risk: u8,
    /// `1 + sum of weights` before clamping
    pub raw_score: i32,
    pub factors: Vec<RiskFactor>,
    /// Most likely first
    pub injuries: Vec<Injury>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::v1()
    }
}

fn w(injury: Injury, points: u32) -> InjuryWeight {
    InjuryWeight { injury, points }
}

fn rule(when: &[RiskFactor], injuries: Vec<InjuryWeight>) -> InjuryRule {
    banded(when, MIN_RISK, MAX_RISK, injuries)
}

fn banded(when: &[RiskFactor], min_risk: u8, max_risk: u8, injuries: Vec<InjuryWeight>) -> InjuryRule {
    InjuryRule {
        when: when.to_vec(),
        min_risk,
        max_risk,
        injuries,
    }
}

impl RuleTable {
    /// The built-in table.
    pub fn v1() -> Self {
        use Injury::*;
        use RiskFactor::*;

        let factors = [
            (SteepAscent, 1),
            (SteepDescent, 2),
            (SharpCurve, 1),
            (ColdTemperature, 1),
            (StrongWind, 1),
            (Precipitation, 1),
            (AdverseCondition, 1),
            (IrregularSurface, 1),
            (Nighttime, 1),
            (MassStart, 1),
            (LargeField, 1),
            (NoHelmet, 1),
            (NoProtectors, 1),
            (NoviceRider, 1),
            (ExperiencedRider, -1),
            (YoungRider, 1),
            (SeniorRider, 1),
            (CarbonFrame, 1),
            (OveruseKnee, 1),
            (BackPain, 1),
            (GravityDiscipline, 2),
            // Rider gender is carried on the context but has no factor in this version
        ]
        .into_iter()
        .map(|(factor, weight)| FactorRule { factor, weight })
        .collect();

        let injuries = vec![
            // Any fall
            rule(&[], vec![w(Abrasion, 3), w(Contusion, 2)]),
            // Factor combinations
            rule(&[SharpCurve, Precipitation], vec![w(Abrasion, 2), w(Contusion, 2)]),
            rule(&[SharpCurve, AdverseCondition], vec![w(Abrasion, 2), w(Contusion, 1)]),
            rule(&[SharpCurve, IrregularSurface], vec![w(Abrasion, 1), w(WristInjury, 2)]),
            rule(&[SteepDescent], vec![w(ClavicleFracture, 2)]),
            rule(
                &[SteepDescent, NoProtectors],
                vec![w(ClavicleFracture, 2), w(PelvicFracture, 2), w(SpinalInjury, 1)],
            ),
            rule(&[NoHelmet], vec![w(HeadInjury, 3)]),
            rule(&[Nighttime], vec![w(HeadInjury, 1), w(Contusion, 1)]),
            rule(&[MassStart], vec![w(Contusion, 2), w(ClavicleFracture, 1)]),
            rule(&[LargeField], vec![w(Contusion, 1)]),
            rule(&[ColdTemperature, Precipitation], vec![w(Hypothermia, 2)]),
            rule(&[OveruseKnee], vec![w(KneeStrain, 3)]),
            rule(&[BackPain], vec![w(BackStrain, 3)]),
            rule(&[SeniorRider], vec![w(WristInjury, 1), w(PelvicFracture, 1)]),
            rule(&[GravityDiscipline], vec![w(SpinalInjury, 2)]),
            // Severity bands
            banded(&[], 3, 4, vec![w(ClavicleFracture, 1), w(WristInjury, 1)]),
            banded(
                &[],
                5,
                5,
                vec![w(ClavicleFracture, 1), w(SpinalInjury, 1), w(PelvicFracture, 1)],
            ),
            banded(&[GravityDiscipline], 3, 4, vec![w(SpinalInjury, 1)]),
            banded(&[GravityDiscipline], 5, 5, vec![w(SevereTorsoInjury, 2)]),
        ];

        Self {
            version: RULE_TABLE_VERSION,
            factors,
            injuries,
        }
    }

    /// Load a table from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json).map_err(|e| RiskError::ConfigError {
            message: format!("invalid rule table: {}", e),
        })?;
        table.validate()?;
        Ok(table)
    }

    /// Reject tables with out-of-range weights, injury bands outside 1..=5, or injury
    /// rules that predict nothing.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 {
            return Err(RiskError::ConfigError {
                message: "rule table version must be at least 1".to_string(),
            });
        }
        if let Some(r) = self
            .factors
            .iter()
            .find(|r| r.weight.abs() > MAX_FACTOR_WEIGHT)
        {
            return Err(RiskError::ConfigError {
                message: format!(
                    "weight {} for {} is outside -{}..={}",
                    r.weight,
                    r.factor.label(),
                    MAX_FACTOR_WEIGHT,
                    MAX_FACTOR_WEIGHT
                ),
            });
        }
        for (i, r) in self.injuries.iter().enumerate() {
            if r.min_risk < MIN_RISK || r.max_risk > MAX_RISK || r.min_risk > r.max_risk {
                return Err(RiskError::ConfigError {
                    message: format!(
                        "injury rule {} has invalid band {}..={}",
                        i, r.min_risk, r.max_risk
                    ),
                });
            }
            if r.injuries.is_empty() {
                return Err(RiskError::ConfigError {
                    message: format!("injury rule {} lists no injuries", i),
                });
            }
        }
        Ok(())
    }

    /// Weight of one factor (0 if the table has no rule for it).
    pub fn weight_of(&self, factor: RiskFactor) -> i32 {
        self.factors
            .iter()
            .filter(|r| r.factor == factor)
            .fold(0i32, |acc, r| acc.saturating_add(r.weight))
    }

    /// Raw and clamped score for a set of fired factors.
    pub fn score(&self, fired: &[RiskFactor]) -> (i32, u8) {
        let raw = fired
            .iter()
            .fold(1i32, |acc, f| acc.saturating_add(self.weight_of(*f)));
        let risk = raw.clamp(MIN_RISK as i32, MAX_RISK as i32) as u8;
        (raw, risk)
    }

    /// Injuries for a set of fired factors and a final score, most likely first.
    pub fn infer_injuries(&self, fired: &[RiskFactor], risk: u8) -> Vec<Injury> {
        let mut points: BTreeMap<Injury, u32> = BTreeMap::new();
        for r in self.injuries.iter().filter(|r| r.matches(fired, risk)) {
            for iw in &r.injuries {
                let p = points.entry(iw.injury).or_insert(0);
                *p = p.saturating_add(iw.points);
            }
        }

        let mut ranked: Vec<(Injury, u32)> = points.into_iter().filter(|(_, p)| *p > 0).collect();
        ranked.sort_by_key(|(injury, p)| (Reverse(*p), *injury));
        ranked.into_iter().map(|(injury, _)| injury).collect()
    }

    /// Score one set of signals.
    pub fn assess(&self, signals: &RiskSignals<'_>, thresholds: &RiskThresholds) -> RiskAssessment {
        let factors = signals.fired_factors(thresholds);
        let (raw_score, risk) = self.score(&factors);
        let injuries = self.infer_injuries(&factors, risk);
        RiskAssessment {
            risk,
            raw_score,
            factors,
            injuries,
        }
    }
}

// =============================================================================
// Segment Scoring
// =============================================================================

/// Scoring output for one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentScore {
    pub terrain: Terrain,
    pub street_surface: StreetSurface,
    pub assessment: RiskAssessment,
}

/// Score a segment. Pure: the same inputs always give the same output.
pub fn score_segment(
    geometry: &SegmentGeometry,
    weather: &WeatherReading,
    nighttime: bool,
    surface: StreetSurface,
    rider: &RiderContext,
    table: &RuleTable,
    config: &PipelineConfig,
) -> SegmentScore {
    let signals = RiskSignals {
        slope: geometry.slope,
        sharp_curve: geometry.sharp_curve,
        weather,
        nighttime,
        surface,
        rider,
    };
    SegmentScore {
        terrain: Terrain::from_slope(geometry.slope, config.terrain_slope_pct),
        street_surface: surface,
        assessment: table.assess(&signals, &config.thresholds),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rider::{Equipment, FrameMaterial, Gender, RaceType, RiderType};

    fn mild_weather() -> WeatherReading {
        WeatherReading::new(15.0, 5.0, 0.0, "clear")
    }

    fn signals<'a>(weather: &'a WeatherReading, rider: &'a RiderContext) -> RiskSignals<'a> {
        RiskSignals {
            slope: 0.0,
            sharp_curve: false,
            weather,
            nighttime: false,
            surface: StreetSurface::Asphalt,
            rider,
        }
    }

    #[test]
    fn test_every_factor_has_a_weight() {
        let table = RuleTable::v1();
        for f in RiskFactor::ALL {
            assert_ne!(table.weight_of(f), 0, "{:?} has no weight", f);
        }
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_descent_weighted_above_ascent() {
        let table = RuleTable::v1();
        assert!(table.weight_of(RiskFactor::SteepDescent) > table.weight_of(RiskFactor::SteepAscent));
    }

    #[test]
    fn test_score_baseline_and_clamp() {
        let table = RuleTable::v1();
        assert_eq!(table.score(&[]), (1, 1));
        assert_eq!(table.score(&[RiskFactor::ExperiencedRider]), (0, 1));
        let (raw, risk) = table.score(&RiskFactor::ALL);
        assert!(raw > 5);
        assert_eq!(risk, 5);
    }

    #[test]
    fn test_weather_factors_sum_independently() {
        let table = RuleTable::v1();
        let rider = RiderContext {
            rider_type: RiderType::Elite,
            ..RiderContext::default()
        };
        let weather = WeatherReading::new(2.0, 30.0, 4.0, "heavy rain");
        let fired = signals(&weather, &rider).fired_factors(&RiskThresholds::default());
        for f in [
            RiskFactor::ColdTemperature,
            RiskFactor::StrongWind,
            RiskFactor::Precipitation,
            RiskFactor::AdverseCondition,
        ] {
            assert!(fired.contains(&f), "{:?} should fire", f);
        }
        // 1 + 4 weather - 1 elite
        assert_eq!(table.score(&fired), (4, 4));
    }

    #[test]
    fn test_mild_day_default_rider_is_low_risk() {
        let rider = RiderContext::default();
        let weather = mild_weather();
        let assessment = RuleTable::v1().assess(&signals(&weather, &rider), &RiskThresholds::default());
        assert!(assessment.risk <= 2);
        assert_eq!(assessment.injuries[..2], [Injury::Abrasion, Injury::Contusion]);
    }

    #[test]
    fn test_gender_does_not_change_assessment() {
        let table = RuleTable::v1();
        let weather = mild_weather();
        let unset = RiderContext::default();
        let baseline = table.assess(&signals(&weather, &unset), &RiskThresholds::default());
        for gender in [Gender::Male, Gender::Female, Gender::Diverse] {
            let rider = RiderContext {
                gender: Some(gender),
                ..RiderContext::default()
            };
            let assessment = table.assess(&signals(&weather, &rider), &RiskThresholds::default());
            assert_eq!(assessment, baseline, "{:?}", gender);
        }
    }

    #[test]
    fn test_worst_case_clamps_to_five() {
        let rider = RiderContext {
            rider_type: RiderType::Beginner,
            age: 70,
            race_type: Some(RaceType::Downhill),
            equipment: Equipment {
                helmet: false,
                protectors: false,
            },
            overuse_knee: true,
            back_pain: true,
            mass_start: true,
            participants: 500,
            material: FrameMaterial::Carbon,
            ..RiderContext::default()
        };
        let weather = WeatherReading::new(-5.0, 80.0, 30.0, "thunderstorm");
        let s = RiskSignals {
            slope: -25.0,
            sharp_curve: true,
            weather: &weather,
            nighttime: true,
            surface: StreetSurface::Gravel,
            rider: &rider,
        };
        let assessment = RuleTable::v1().assess(&s, &RiskThresholds::default());
        assert_eq!(assessment.risk, 5);
        assert!(assessment.raw_score > 5);
        assert!(assessment.injuries.contains(&Injury::SevereTorsoInjury));
    }

    #[test]
    fn test_protectors_only_count_off_road() {
        let weather = mild_weather();
        let road = RiderContext {
            race_type: Some(RaceType::Road),
            ..RiderContext::default()
        };
        let mtb = RiderContext {
            race_type: Some(RaceType::Mtb),
            ..RiderContext::default()
        };
        let t = RiskThresholds::default();
        assert!(!signals(&weather, &road).fired_factors(&t).contains(&RiskFactor::NoProtectors));
        assert!(signals(&weather, &mtb).fired_factors(&t).contains(&RiskFactor::NoProtectors));
    }

    #[test]
    fn test_sharp_wet_curve_predicts_abrasions_then_contusions() {
        let table = RuleTable::v1();
        let fired = [RiskFactor::SharpCurve, RiskFactor::Precipitation];
        let (_, risk) = table.score(&fired);
        assert_eq!(risk, 3);
        let injuries = table.infer_injuries(&fired, risk);
        assert_eq!(injuries[..2], [Injury::Abrasion, Injury::Contusion]);
        // Severity band for 3-4
        assert!(injuries.contains(&Injury::ClavicleFracture));
    }

    #[test]
    fn test_unprotected_descent_predicts_fractures_first() {
        let table = RuleTable::v1();
        let fired = [RiskFactor::SteepDescent, RiskFactor::NoProtectors];
        let (_, risk) = table.score(&fired);
        assert_eq!(risk, 4);
        let injuries = table.infer_injuries(&fired, risk);
        assert_eq!(injuries[0], Injury::ClavicleFracture);
        assert!(injuries.contains(&Injury::PelvicFracture));
        assert!(injuries.contains(&Injury::SpinalInjury));
    }

    #[test]
    fn test_injury_order_is_stable() {
        let table = RuleTable::v1();
        let fired = [RiskFactor::OveruseKnee, RiskFactor::BackPain];
        let first = table.infer_injuries(&fired, 3);
        for _ in 0..10 {
            assert_eq!(table.infer_injuries(&fired, 3), first);
        }
        // Abrasion 3, KneeStrain 3, BackStrain 3 tie: declaration order
        assert_eq!(first[..3], [Injury::Abrasion, Injury::KneeStrain, Injury::BackStrain]);
    }

    #[test]
    fn test_table_round_trips_and_rejects_bad_bands() {
        let json = serde_json::to_string(&RuleTable::v1()).unwrap();
        assert_eq!(RuleTable::from_json_str(&json).unwrap(), RuleTable::v1());

        let mut bad = RuleTable::v1();
        bad.injuries[0].max_risk = 9;
        assert!(matches!(bad.validate(), Err(RiskError::ConfigError { .. })));
    }

    #[test]
    fn test_oversized_weights_rejected_and_saturate() {
        let mut huge = RuleTable::v1();
        huge.factors[0].weight = i32::MAX;
        huge.factors[1].weight = i32::MAX;
        let json = serde_json::to_string(&huge).unwrap();
        assert!(matches!(
            RuleTable::from_json_str(&json),
            Err(RiskError::ConfigError { .. })
        ));

        // An unvalidated table still scores without wrapping
        let (raw, risk) = huge.score(&[RiskFactor::SteepAscent, RiskFactor::SteepDescent]);
        assert_eq!(raw, i32::MAX);
        assert_eq!(risk, 5);

        let mut edge = RuleTable::v1();
        edge.factors[0].weight = -MAX_FACTOR_WEIGHT;
        assert!(edge.validate().is_ok());
        edge.factors[0].weight = MAX_FACTOR_WEIGHT + 1;
        assert!(edge.validate().is_err());
    }

    #[test]
    fn test_score_segment_terrain() {
        let geometry = SegmentGeometry {
            index: 0,
            start_km: 0.0,
            end_km: 0.005,
            length_km: 0.005,
            center: crate::GpsPoint::new(47.0, 8.0),
            points: Vec::new(),
            slope: -6.0,
            turn_deg: 0.0,
            sharp_curve: false,
        };
        let weather = mild_weather();
        let score = score_segment(
            &geometry,
            &weather,
            false,
            StreetSurface::Cobblestone,
            &RiderContext::default(),
            &RuleTable::v1(),
            &PipelineConfig::default(),
        );
        assert_eq!(score.terrain, Terrain::Descent);
        assert_eq!(score.street_surface, StreetSurface::Cobblestone);
        assert!(score.assessment.factors.contains(&RiskFactor::SteepDescent));
        assert!(score.assessment.factors.contains(&RiskFactor::IrregularSurface));
        // 1 + descent 2 + surface 1 + novice 1
        assert_eq!(score.assessment.risk, 5);
    }
}
