//! Built-in lesson scripts. Compiled in; never loaded from disk or network.
//!
//! Every module follows the same arc: a bug report, a code walkthrough, an
//! interactive lab that dramatizes the bug or the fix, a summary, and a victory card.

use crate::domain::{InteractiveConfig, Lesson, QuizOption, Speaker, Step, ViewContent};

fn step(id: u32, speaker: Speaker, text: &str, view: ViewContent) -> Step {
  Step { id, speaker, text: text.into(), view }
}

fn image(prompt: &str) -> ViewContent {
  ViewContent::Image { image_prompt: prompt.into() }
}

fn code(snippet: &str) -> ViewContent {
  ViewContent::CodeExplain { code_snippet: snippet.into() }
}

fn lab(config: InteractiveConfig) -> ViewContent {
  ViewContent::InteractiveLab { interactive_config: config }
}

fn summary(snippet: &str) -> ViewContent {
  ViewContent::TechSummary { code_snippet: snippet.into() }
}

fn victory(prompt: &str) -> ViewContent {
  ViewContent::Victory { image_prompt: prompt.into() }
}

fn lesson(id: &str, title: &str, concept: &str, steps: Vec<Step>) -> Lesson {
  Lesson { id: id.into(), title: title.into(), concept: concept.into(), steps }
}

/// The full catalog in teaching order.
pub fn catalog() -> Vec<Lesson> {
  vec![
    state_retention(),
    lazy_lists(),
    slot_composition(),
    side_effects(),
    derived_state(),
    state_hoisting(),
    navigation_arguments(),
  ]
}

fn state_retention() -> Lesson {
  lesson("remember", "The Forgetful Counter", "State retention across recomposition", vec![
    step(1, Speaker::C, "Customers keep tapping 'add to cart' and the counter stays at zero. Zero!", image("a frustrated shop owner staring at a cart badge stuck at 0")),
    step(2, Speaker::A, "Every recomposition runs the function again. A plain local variable is born fresh each time.", code("@Composable\nfun CartBadge() {\n    var count = 0\n    Button(onClick = { count++ }) { Text(\"$count\") }\n}")),
    step(3, Speaker::B, "Let me tap it myself and see the amnesia.", lab(InteractiveConfig::AmnesiaBug { target_count: 3 })),
    step(4, Speaker::A, "`remember` stores the value in the composition, and `mutableStateOf` tells the runtime to recompose when it changes.", summary("var count by remember { mutableStateOf(0) }")),
    step(5, Speaker::D, "The counter remembers. The cart is saved.", victory("a cart badge glowing with the number 3")),
  ])
}

fn lazy_lists() -> Lesson {
  lesson("lazy-column", "A Thousand Snacks", "Lazy list virtualization", vec![
    step(1, Speaker::C, "The snack catalog takes ten seconds to open. We only have a thousand snacks!", image("a phone frozen on a loading spinner above a mountain of snacks")),
    step(2, Speaker::A, "A Column composes every child up front. A thousand rows, all built before the first frame.", code("Column(Modifier.verticalScroll(rememberScrollState())) {\n    snackList.forEach { SnackItem(it) }\n}")),
    step(3, Speaker::A, "LazyColumn only composes what is on screen. Scroll down and watch the composed-row count.", lab(InteractiveConfig::LazySolution { threshold_px: 1500 })),
    step(4, Speaker::B, "Now I'll write the items block myself.", lab(InteractiveConfig::GuidedTyping { target_code: "items(snackList) { snack -> SnackItem(snack) }".into() })),
    step(5, Speaker::A, "Give stable keys too, so rows keep their state when the list reorders.", summary("LazyColumn {\n    items(snackList, key = { it.id }) { snack -> SnackItem(snack) }\n}")),
    step(6, Speaker::D, "The catalog opens instantly.", victory("a smooth-scrolling snack list with confetti")),
  ])
}

fn slot_composition() -> Lesson {
  lesson("slots", "The Card With a Hole In It", "Slot-based composition", vec![
    step(1, Speaker::C, "Marketing wants the promo card with an image. Then with a video. Then with a countdown.", image("a designer holding three nearly identical card mockups")),
    step(2, Speaker::A, "Instead of a parameter for every variant, accept a composable lambda and let the caller fill the slot.", code("@Composable\nfun PromoCard(\n    title: String,\n    media: @Composable () -> Unit,\n) {\n    Card { Column { media(); Text(title) } }\n}")),
    step(3, Speaker::A, "Quick check on modifiers before we style the slot.", lab(InteractiveConfig::Quiz {
      question: "You want the ripple to cover the padding too. Which chain is right?".into(),
      options: vec![
        QuizOption { id: "padding-first".into(), label: "Modifier.padding(16.dp).clickable { }".into() },
        QuizOption { id: "clickable-first".into(), label: "Modifier.clickable { }.padding(16.dp)".into() },
        QuizOption { id: "either".into(), label: "Order does not matter".into() },
      ],
      correct_option: "clickable-first".into(),
      explanation: "Modifiers wrap from the outside in: clickable first means the click area includes the padding.".into(),
    })),
    step(4, Speaker::A, "Slots keep the container dumb and the content flexible.", summary("PromoCard(title = \"Flash sale\") {\n    CountdownTimer(deadline)\n}")),
    step(5, Speaker::D, "One card, endless promos.", victory("three promo cards sharing one frame")),
  ])
}

fn side_effects() -> Lesson {
  lesson("effects", "The Listener Leak", "Side-effect lifecycles", vec![
    step(1, Speaker::C, "After a few minutes the app gets slower and slower, and the battery melts.", image("a phone sweating next to a battery icon in the red")),
    step(2, Speaker::A, "Registering a listener straight in the composable body registers it again on every recomposition.", code("@Composable\nfun PriceTicker(feed: PriceFeed) {\n    feed.addListener { price -> /* ... */ }\n}")),
    step(3, Speaker::B, "Force a few recompositions and count the listeners.", lab(InteractiveConfig::LeakCounter { target_count: 5 })),
    step(4, Speaker::A, "DisposableEffect registers once per key and cleans up in onDispose.", summary("DisposableEffect(feed) {\n    val l = feed.addListener { }\n    onDispose { feed.removeListener(l) }\n}")),
    step(5, Speaker::D, "One listener, cool battery.", victory("a calm phone with a full battery")),
  ])
}

fn derived_state() -> Lesson {
  lesson("derived-state", "The Search That Stutters", "Derived and filtered state", vec![
    step(1, Speaker::C, "Typing in the snack search lags on every keystroke.", image("a search bar with letters appearing one second late")),
    step(2, Speaker::A, "Filtering inside the body reruns on every recomposition. Derive it once and only when inputs change.", code("val visible by remember(snacks, query) {\n    derivedStateOf { snacks.filter { it.name.contains(query, true) } }\n}")),
    step(3, Speaker::B, "Let me type the derived filter from memory.", lab(InteractiveConfig::GuidedTyping { target_code: "derivedStateOf { snacks.filter { it.name.contains(query, true) } }".into() })),
    step(4, Speaker::A, "Keep the source of truth small; compute the rest.", summary("val query by rememberSaveable { mutableStateOf(\"\") }")),
    step(5, Speaker::D, "The search is instant.", victory("a search result list updating in real time")),
  ])
}

fn state_hoisting() -> Lesson {
  lesson("hoisting", "Who Owns the Checkbox?", "State hoisting and event callbacks", vec![
    step(1, Speaker::C, "The 'select all' button can't see which snacks are checked.", image("a checklist where the header checkbox ignores the rows")),
    step(2, Speaker::A, "The row owns its state, so nobody above can read it. Move the state up; pass the value down and events up.", code("@Composable\nfun SnackRow(snack: Snack, checked: Boolean, onCheckedChange: (Boolean) -> Unit)")),
    step(3, Speaker::A, "Your turn. Hoist the checked state out of SnackRow and write the parent that owns it.", lab(InteractiveConfig::AiAssignment {
      persona: "You are Mia, a friendly senior Android developer mentoring a junior colleague.".into(),
      assignment_prompt: "Refactor SnackRow so it no longer owns its checked state: it must take `checked: Boolean` and `onCheckedChange: (Boolean) -> Unit`, and a parent composable must hold the state for all rows.".into(),
    })),
    step(4, Speaker::A, "State flows down, events flow up. The parent is now the single source of truth.", summary("val checked = remember { mutableStateMapOf<Long, Boolean>() }")),
    step(5, Speaker::D, "'Select all' finally selects all.", victory("a fully checked list with a proud developer")),
  ])
}

fn navigation_arguments() -> Lesson {
  lesson("navigation", "The Empty Detail Screen", "Navigation argument passing", vec![
    step(1, Speaker::C, "Tapping a snack crashes the app. Every single time.", image("a crash dialog over a snack detail screen")),
    step(2, Speaker::A, "The detail route declares a required argument, but the caller navigates without it.", code("composable(\"detail/{snackId}\") { entry ->\n    val id = entry.arguments?.getString(\"snackId\")!!\n    SnackDetail(id)\n}\n\nnavController.navigate(\"detail\")")),
    step(3, Speaker::B, "Let me reproduce it.", lab(InteractiveConfig::NavigationCrash)),
    step(4, Speaker::A, "Build the route with the argument and declare its type.", summary("navController.navigate(\"detail/${snack.id}\")\n\ncomposable(\n    \"detail/{snackId}\",\n    arguments = listOf(navArgument(\"snackId\") { type = NavType.LongType }),\n)")),
    step(5, Speaker::D, "Every snack opens its own page.", victory("a snack detail page with a big photo")),
  ])
}
