use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use crate::analysis::coefficients::{experimental_coefficients, CoefficientTable};
use crate::analysis::eigen::{subset_eigenvalues, LocusPoint, SubsetEigenvalues};
use crate::analysis::response::{aggregate, BodeSummary, FrequencyResponse};
use crate::config::Config;
use crate::data::filter::{filter, Category, FilterCriteria, SpeedBin};
use crate::data::loader::load;
use crate::data::metadata::MetadataTable;
use crate::data::model::{RunCollection, Subset};
use crate::error::Result;
use crate::physics::{FirstPrinciplesModel, Parameter, Rider};

// ---------------------------------------------------------------------------
// Views handed to the presentation layer
// ---------------------------------------------------------------------------

/// Experimental and model acceleration coefficients.
#[derive(Debug, Clone)]
pub struct CoefficientView {
    pub experimental: CoefficientTable,
    pub models: Vec<(Rider, CoefficientTable)>,
}

/// Subset Bode summary and each selected rider's model at the mean speed.
///
/// `experimental` is `None` when no run matches; `models` is then empty.
#[derive(Debug, Clone)]
pub struct BodeView {
    pub experimental: Option<BodeSummary>,
    pub models: Vec<(Rider, FrequencyResponse)>,
}

/// Subset eigenvalues and model root loci.
#[derive(Debug, Clone)]
pub struct RootLocusView {
    pub experimental: SubsetEigenvalues,
    pub models: Vec<(Rider, Vec<LocusPoint>)>,
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Everything the viewer needs, independent of rendering.
pub struct Session {
    collection: RunCollection,
    models: BTreeMap<Rider, FirstPrinciplesModel>,
    criteria: FilterCriteria,
    /// Indices of runs passing the current criteria (cached).
    visible_indices: Vec<usize>,
    locus_speeds: Vec<f64>,
    coefficient_speeds: Vec<f64>,
}

impl Session {
    /// Load the runs, the run table and all rider models named by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let metadata = MetadataTable::from_path(&config.metadata_file)?;
        let collection = load(&config.run_file, &metadata, config.bode_frequencies.build()?)?;
        let models = Rider::ALL
            .into_iter()
            .map(|r| FirstPrinciplesModel::load(r, config.inputs, config.parameter_dir.as_deref()))
            .collect::<Result<Vec<_>>>()?;
        info!("Loaded {} first-principles models", models.len());
        Ok(Self::new(collection, models, config))
    }

    pub fn new(
        collection: RunCollection,
        models: impl IntoIterator<Item = FirstPrinciplesModel>,
        config: &Config,
    ) -> Self {
        let mut session = Session {
            collection,
            models: models.into_iter().map(|m| (m.rider(), m)).collect(),
            criteria: config.criteria.clone(),
            visible_indices: Vec::new(),
            locus_speeds: config.locus_speeds.values(),
            coefficient_speeds: config.coefficient_speeds.values(),
        };
        session.refilter();
        session
    }

    pub fn collection(&self) -> &RunCollection {
        &self.collection
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn model(&self, rider: Rider) -> Option<&FirstPrinciplesModel> {
        self.models.get(&rider)
    }

    /// Runs passing the current criteria.
    pub fn subset(&self) -> Subset<'_> {
        Subset::from_indices(&self.collection, self.visible_indices.clone())
    }

    /// Recompute `visible_indices` after a criteria change.
    fn refilter(&mut self) {
        self.visible_indices = filter(&self.collection, &self.criteria).indices().to_vec();
        debug!("{} runs visible", self.visible_indices.len());
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.refilter();
    }

    /// Distinct values of a category across the whole collection.
    pub fn unique_values(&self, category: Category) -> BTreeSet<String> {
        self.collection
            .runs()
            .iter()
            .map(|r| match category {
                Category::Rider => r.rider.clone(),
                Category::Maneuver => r.maneuver.clone(),
                Category::Environment => r.environment.clone(),
            })
            .collect()
    }

    /// Toggle one value of a category. An unrestricted category starts out
    /// with every value in the collection selected.
    pub fn toggle_value(&mut self, category: Category, value: &str) {
        let all = self.unique_values(category);
        let selected = self.criteria.category_mut(category).get_or_insert(all);
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
        self.refilter();
    }

    /// Lift the restriction on a category.
    pub fn select_all(&mut self, category: Category) {
        *self.criteria.category_mut(category) = None;
        self.refilter();
    }

    /// Keep nothing in a category.
    pub fn select_none(&mut self, category: Category) {
        *self.criteria.category_mut(category) = Some(BTreeSet::new());
        self.refilter();
    }

    pub fn toggle_speed(&mut self, bin: SpeedBin) {
        let selected = self
            .criteria
            .speed
            .get_or_insert_with(|| SpeedBin::ALL.into_iter().collect());
        if !selected.remove(&bin) {
            selected.insert(bin);
        }
        self.refilter();
    }

    /// Bode curves are compared at one speed: keep only the 2.0 m/s bin.
    pub fn select_speed_group(&mut self) {
        self.criteria.speed = Some([SpeedBin::S2_0].into());
        self.refilter();
    }

    pub fn set_mean_fit(&mut self, threshold: f64) {
        self.criteria.mean_fit = Some(threshold);
        self.refilter();
    }

    /// Set `parameter` to its default plus `delta` in every rider model.
    pub fn adjust_parameter(&mut self, parameter: Parameter, delta: f64) {
        for model in self.models.values_mut() {
            let value = model.default_parameters().get(parameter) + delta;
            model.set(parameter, value);
        }
    }

    /// Riders named by the criteria that have a model; all riders when the
    /// criteria do not restrict riders.
    pub fn selected_riders(&self) -> Vec<Rider> {
        match &self.criteria.rider {
            None => self.models.keys().copied().collect(),
            Some(names) => names
                .iter()
                .filter_map(|n| n.parse::<Rider>().ok())
                .filter(|r| self.models.contains_key(r))
                .collect(),
        }
    }

    fn selected_models(&self) -> impl Iterator<Item = &FirstPrinciplesModel> + '_ {
        self.selected_riders()
            .into_iter()
            .filter_map(|r| self.models.get(&r))
    }

    pub fn coefficient_view(&self) -> Result<CoefficientView> {
        let models = self
            .selected_models()
            .map(|m| Ok((m.rider(), m.matrices(&self.coefficient_speeds)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(CoefficientView {
            experimental: experimental_coefficients(&self.subset()),
            models,
        })
    }

    pub fn bode_view(&self) -> Result<BodeView> {
        let experimental = aggregate(&self.subset());
        let models = match &experimental {
            None => Vec::new(),
            Some(summary) => self
                .selected_models()
                .map(|m| {
                    let response =
                        m.magnitude_phase(summary.mean_speed, self.collection.grid().as_slice())?;
                    Ok((m.rider(), response))
                })
                .collect::<Result<Vec<_>>>()?,
        };
        Ok(BodeView {
            experimental,
            models,
        })
    }

    pub fn root_locus_view(&self) -> Result<RootLocusView> {
        let models = self
            .selected_models()
            .map(|m| Ok((m.rider(), m.root_locus(&self.locus_speeds)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(RootLocusView {
            experimental: subset_eigenvalues(&self.subset()),
            models,
        })
    }
}
