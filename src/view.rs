//! Projections of the ordering store
//!
//! The flat filtered list and the grouped-by-module view are both derived
//! from the store on demand. Nothing here is stored back.

use serde::{Deserialize, Serialize};

use crate::domain::{Lesson, LessonId, LessonKind, ModuleId, PublishStatus};
use crate::store::OrderingStore;

pub const UNGROUPED_TITLE: &str = "Ungrouped";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Position within the module
    #[default]
    Position,
    /// Most recently created first
    Newest,
    LongestFirst,
    MostCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleFilter {
    #[default]
    All,
    Ungrouped,
    Module(ModuleId),
}

/// Filter and sort settings of the lesson list. All predicates must hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewFilter {
    /// Case-insensitive substring of the title
    pub search: String,
    pub kind: Option<LessonKind>,
    pub status: Option<PublishStatus>,
    pub module: ModuleFilter,
    pub sort: SortKey,
}

impl ViewFilter {
    pub fn sorted_by(sort: SortKey) -> Self {
        Self {
            sort,
            ..Default::default()
        }
    }

    pub fn matches(&self, lesson: &Lesson) -> bool {
        let search = self.search.trim();
        if !search.is_empty() && !lesson.title.to_lowercase().contains(&search.to_lowercase()) {
            return false;
        }
        if self.kind.is_some_and(|kind| lesson.kind != kind) {
            return false;
        }
        if self.status.is_some_and(|status| lesson.status != status) {
            return false;
        }
        match &self.module {
            ModuleFilter::All => true,
            ModuleFilter::Ungrouped => lesson.is_ungrouped(),
            ModuleFilter::Module(id) => lesson.module_id.as_ref() == Some(id),
        }
    }
}

/// Lessons passing the filter, sorted. Sorting is stable so equal keys
/// keep store order.
pub fn filtered_lessons<'a>(store: &'a OrderingStore, filter: &ViewFilter) -> Vec<&'a Lesson> {
    let mut lessons: Vec<&Lesson> = store.lessons().iter().filter(|l| filter.matches(l)).collect();
    match filter.sort {
        // Module by module, in the order the grouped view shows them
        SortKey::Position => {
            let modules = store.modules();
            let rank = |lesson: &Lesson| {
                lesson
                    .module_id
                    .as_ref()
                    .and_then(|id| modules.iter().position(|m| m.id == *id))
                    .unwrap_or(modules.len())
            };
            lessons.sort_by_key(|l| (rank(l), l.position));
        }
        // Ids without a timestamp sort last
        SortKey::Newest => lessons.sort_by(|a, b| b.id.created_at().cmp(&a.id.created_at())),
        SortKey::LongestFirst => lessons.sort_by(|a, b| b.duration_secs.cmp(&a.duration_secs)),
        SortKey::MostCompleted => lessons.sort_by(|a, b| b.completion_rate.total_cmp(&a.completion_rate)),
    }
    lessons
}

/// One module section of the grouped view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleBucket {
    /// None for the ungrouped bucket
    pub module_id: Option<ModuleId>,
    pub title: String,
    pub lesson_ids: Vec<LessonId>,
}

impl ModuleBucket {
    pub fn is_ungrouped(&self) -> bool {
        self.module_id.is_none()
    }
}

/// Flat and grouped projections computed together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonView {
    pub lesson_ids: Vec<LessonId>,
    /// Every module in store order, then the ungrouped bucket
    pub buckets: Vec<ModuleBucket>,
}

impl LessonView {
    pub fn bucket(&self, module_id: Option<&ModuleId>) -> Option<&ModuleBucket> {
        self.buckets.iter().find(|b| b.module_id.as_ref() == module_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lesson_ids.is_empty()
    }
}

pub fn project(store: &OrderingStore, filter: &ViewFilter) -> LessonView {
    let visible = filtered_lessons(store, filter);

    let mut buckets: Vec<ModuleBucket> = store
        .modules()
        .iter()
        .map(|m| ModuleBucket {
            module_id: Some(m.id.clone()),
            title: m.title.clone(),
            lesson_ids: Vec::new(),
        })
        .collect();
    let mut ungrouped = ModuleBucket {
        module_id: None,
        title: UNGROUPED_TITLE.to_string(),
        lesson_ids: Vec::new(),
    };

    for lesson in &visible {
        let bucket = lesson
            .module_id
            .as_ref()
            .and_then(|id| buckets.iter_mut().find(|b| b.module_id.as_ref() == Some(id)));
        match bucket {
            Some(bucket) => bucket.lesson_ids.push(lesson.id.clone()),
            None => ungrouped.lesson_ids.push(lesson.id.clone()),
        }
    }
    buckets.push(ungrouped);

    LessonView {
        lesson_ids: visible.iter().map(|l| l.id.clone()).collect(),
        buckets,
    }
}

/// Recomputes the view only when the store revision or filter changed
#[derive(Debug, Default)]
pub struct ProjectionCache {
    key: Option<(u64, ViewFilter)>,
    view: LessonView,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&mut self, store: &OrderingStore, filter: &ViewFilter) -> &LessonView {
        let fresh = matches!(&self.key, Some((revision, cached)) if *revision == store.revision() && cached == filter);
        if !fresh {
            self.view = project(store, filter);
            self.key = Some((store.revision(), filter.clone()));
        }
        &self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourseId, Module};

    fn store() -> OrderingStore {
        let mut intro_quiz = Lesson::in_module("65000002aaaaaaaaaaaaaaaa", "Intro quiz", LessonKind::Quiz, "intro", 1);
        intro_quiz.duration_secs = 300;
        intro_quiz.completion_rate = 0.9;
        let mut welcome = Lesson::in_module("65000001aaaaaaaaaaaaaaaa", "Welcome", LessonKind::Video, "intro", 0);
        welcome.duration_secs = 600;
        welcome.status = PublishStatus::Published;
        welcome.completion_rate = 0.5;
        let loose = Lesson::new("legacy", "Loose notes", LessonKind::Text);

        let mut store = OrderingStore::new();
        store.replace_all(
            CourseId::from("c1"),
            vec![Module::new("intro", "Intro"), Module::new("empty", "Empty")],
            vec![intro_quiz, welcome, loose],
        );
        store
    }

    fn titles(lessons: &[&Lesson]) -> Vec<String> {
        lessons.iter().map(|l| l.title.clone()).collect()
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let store = store();
        let filter = ViewFilter {
            search: "INTRO".to_string(),
            kind: Some(LessonKind::Quiz),
            status: Some(PublishStatus::Draft),
            ..Default::default()
        };
        assert_eq!(titles(&filtered_lessons(&store, &filter)), vec!["Intro quiz"]);

        let filter = ViewFilter {
            search: "intro".to_string(),
            kind: Some(LessonKind::Video),
            ..Default::default()
        };
        assert!(filtered_lessons(&store, &filter).is_empty());
    }

    #[test]
    fn test_module_filter() {
        let store = store();
        let filter = ViewFilter {
            module: ModuleFilter::Ungrouped,
            ..Default::default()
        };
        assert_eq!(titles(&filtered_lessons(&store, &filter)), vec!["Loose notes"]);
    }

    #[test]
    fn test_sort_keys() {
        let store = store();
        let by = |sort| titles(&filtered_lessons(&store, &ViewFilter::sorted_by(sort)));

        assert_eq!(by(SortKey::Newest), vec!["Intro quiz", "Welcome", "Loose notes"]);
        assert_eq!(by(SortKey::LongestFirst), vec!["Welcome", "Intro quiz", "Loose notes"]);
        assert_eq!(by(SortKey::MostCompleted), vec!["Intro quiz", "Welcome", "Loose notes"]);
    }

    #[test]
    fn test_position_sort_follows_module_order() {
        let mut store = store();
        let mut modules = store.modules().to_vec();
        modules.insert(0, Module::new("advanced", "Advanced"));
        let mut lessons = store.lessons().to_vec();
        lessons.push(Lesson::in_module("A1", "Deep dive", LessonKind::Video, "advanced", 0));
        lessons.push(Lesson::in_module("A2", "Wrap up", LessonKind::Text, "advanced", 1));
        store.replace_all(CourseId::from("c1"), modules, lessons);

        let view = project(&store, &ViewFilter::default());
        let grouped: Vec<LessonId> = view.buckets.iter().flat_map(|b| b.lesson_ids.clone()).collect();
        assert_eq!(view.lesson_ids, grouped);
        assert_eq!(
            titles(&filtered_lessons(&store, &ViewFilter::default())),
            vec!["Deep dive", "Wrap up", "Welcome", "Intro quiz", "Loose notes"]
        );
    }

    #[test]
    fn test_grouped_view_lists_empty_modules_and_ungrouped_last() {
        let store = store();
        let view = project(&store, &ViewFilter::default());

        let titles: Vec<&str> = view.buckets.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Intro", "Empty", UNGROUPED_TITLE]);
        assert!(view.bucket(Some(&ModuleId::from("empty"))).unwrap().lesson_ids.is_empty());

        let intro = view.bucket(Some(&ModuleId::from("intro"))).unwrap();
        assert_eq!(intro.lesson_ids[0], LessonId::from("65000001aaaaaaaaaaaaaaaa"));
        assert_eq!(view.bucket(None).unwrap().lesson_ids, vec![LessonId::from("legacy")]);
    }

    #[test]
    fn test_cache_recomputes_after_mutation() {
        let mut store = store();
        let mut cache = ProjectionCache::new();
        let filter = ViewFilter::default();
        assert_eq!(cache.view(&store, &filter).lesson_ids.len(), 3);

        store.remove_lesson(&LessonId::from("legacy"));
        assert_eq!(cache.view(&store, &filter).lesson_ids.len(), 2);

        let search = ViewFilter {
            search: "welcome".to_string(),
            ..Default::default()
        };
        assert_eq!(cache.view(&store, &search).lesson_ids.len(), 1);
    }
}
