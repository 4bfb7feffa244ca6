//! # Help Text
//!
//! Displayed on the console via the `.help` command.

pub const MAIN: &str = concat!(
    "**🧭 HostPilot Help**\n",
    "Type a command in plain words, e.g. \"mute\", \"open notepad and type hello\",\n",
    "\"play spotify\", \"mine forward unless you see lava\".\n",
    "\n",
    "**❔ Confirmations**\n",
    "* confirm [n|text]: Answer the open question\n",
    "\n",
    "**📜 History**\n",
    "* history [n]: Recent actions\n",
    "* status: Queue and executor state\n",
    "\n",
    "**📂 Workspace**\n",
    "* files [scripts]: List files\n",
    "* read [name]\n",
    "* write [name] [content]\n",
    "* script [name] [content]: Save a script (.py .js .ps1 .bat .cmd)\n",
    "* delete [name]\n",
    "* run [name] [args]\n",
    "\n",
    "**⚡ Misc**\n",
    "* help\n",
    "* quit\n"
);
